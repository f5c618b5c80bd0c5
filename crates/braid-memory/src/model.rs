use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use braid_core::{IdentityId, SessionId};

/// An embedded, append-only record of user-relevant text.
///
/// Owned by exactly one identity; immutable once written. `position` is
/// monotonically increasing per owner and is the insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: i64,
    pub owner_id: IdentityId,
    pub kind: MemoryKind,
    pub text: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub position: i64,
}

/// What produced a memory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// Seeded at registration from the identity's name/description.
    Profile,
    /// Condensed record of one conversation turn.
    Turn,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Profile => "profile",
            MemoryKind::Turn => "turn",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "profile" => MemoryKind::Profile,
            _ => MemoryKind::Turn,
        }
    }
}

/// Both directions of an identity's authorization edges.
///
/// `exposed_to` = outgoing edges (who I let read my memory);
/// `amplify_from` = incoming edges (whose memory augments mine).
/// Id lists are sorted for deterministic output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipView {
    pub exposed_to: Vec<IdentityId>,
    pub amplify_from: Vec<IdentityId>,
}

/// Wholesale replacement of one or both sides of an identity's edges.
/// `None` leaves that side untouched.
#[derive(Debug, Clone, Default)]
pub struct RelationshipUpdate {
    pub exposed_to: Option<Vec<IdentityId>>,
    pub amplify_from: Option<Vec<IdentityId>>,
}

impl RelationshipUpdate {
    pub fn exposed_to(ids: Vec<IdentityId>) -> Self {
        Self {
            exposed_to: Some(ids),
            amplify_from: None,
        }
    }

    pub fn amplify_from(ids: Vec<IdentityId>) -> Self {
        Self {
            exposed_to: None,
            amplify_from: Some(ids),
        }
    }
}

/// A registered identity. The bearer token itself is never stored, only its
/// blake3 hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: IdentityId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Session metadata. The message log is stored separately, append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub owner_id: IdentityId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
