//! # braid-llm
//!
//! The two external collaborators of the Braid core, behind traits:
//!
//! - [`EmbeddingProvider`]: text → fixed-length vector, with possible failure.
//! - [`ReasoningProvider`]: augmented context → assistant message. The
//!   reasoning layer may invoke tools internally; the core only consumes the
//!   final reply.
//!
//! OpenAI adapters for both live in [`openai`]; deterministic mocks for tests
//! live in [`mock`].

pub mod mock;
pub mod openai;
pub mod provider;

pub use mock::{MockEmbedding, MockReasoner};
pub use openai::{OpenAiEmbedding, OpenAiReasoner};
pub use provider::{EmbeddingProvider, ReasoningProvider, ReasoningRequest, ReasoningResponse};
