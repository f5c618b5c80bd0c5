//! # braid-memory
//!
//! The memory subsystem of the Braid runtime:
//!
//! - **Memory store**: per-identity append-only log of embedded memory items
//!   (SQLite, persistent). Items are never edited or deleted, so embeddings
//!   stay in sync with their source text.
//! - **Relationship graph**: directed authorization edges controlling whose
//!   memory a given identity's agent may read.
//! - **Retrieval engine**: relevance-ranked selection over the requester's
//!   items plus the items of every identity that authorized them.
//!
//! Session metadata and message logs live in the same database (the schema is
//! created in [`store::MemoryStore::open`]); the session manager in
//! `braid-runtime` drives them.

pub mod graph;
pub mod model;
pub mod retrieval;
pub mod store;

pub use graph::RelationshipGraph;
pub use model::{
    IdentityRecord, MemoryItem, MemoryKind, RelationshipUpdate, RelationshipView, SessionRecord,
};
pub use retrieval::{RetrievalConfig, RetrievalEngine, cosine_similarity};
pub use store::MemoryStore;
