//! # braid-core
//!
//! Core types and primitives for the Braid conversational runtime.
//! This crate defines the shared vocabulary used by every other crate in the
//! workspace: identity and session ids, the conversation message model, and
//! the unified error taxonomy.

pub mod error;
pub mod message;
pub mod types;

pub use error::{BraidError, Result};
pub use message::{Message, MessageContent, Role};
pub use types::*;
