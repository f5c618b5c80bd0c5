//! # braid-runtime
//!
//! The conversational runtime — registers identities, manages sessions, and
//! drives the per-turn cycle over memory and the reasoning provider.
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────────┐
//!              │  Orchestrator │  ← One turn per call
//!              │               │
//!              │  1. Receive   │  ← Persist human message
//!              │  2. Recall    │  ← Memory retrieval (own + shared)
//!              │  3. Assemble  │  ← Inject snippet, trim context
//!              │  4. Think     │  ← Reasoning provider call
//!              │  5. Respond   │  ← Persist + return reply
//!              │  6. Remember  │  ← Condense turn into memory
//!              └───────┬───────┘
//!                      │
//!          ┌───────────┼───────────┐
//!          ▼           ▼           ▼
//!     ┌─────────┐ ┌─────────┐ ┌─────────┐
//!     │Reasoning│ │ Memory  │ │Identity │
//!     │Provider │ │  Store  │ │Registry │
//!     └─────────┘ └─────────┘ └─────────┘
//! ```
//!
//! Turns on the same session are serialized by a per-session run lock; turns
//! on different sessions proceed concurrently.

pub mod context;
pub mod identity;
pub mod orchestrator;
pub mod session;

pub use context::{format_memory_snippet, trim_context};
pub use identity::IdentityRegistry;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use session::SessionManager;
