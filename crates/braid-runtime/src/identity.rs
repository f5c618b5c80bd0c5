use std::sync::Arc;

use rand::Rng;
use tracing::info;

use braid_core::{BraidError, IdentityId, Result};
use braid_memory::{IdentityRecord, MemoryKind, MemoryStore};

/// Registration and token authentication for identities.
///
/// The bearer token is returned exactly once, at registration; only its
/// blake3 hash is persisted. Registration also seeds the new identity's
/// memory with profile items so retrieval has something to stand on from
/// the first turn.
pub struct IdentityRegistry {
    store: Arc<MemoryStore>,
}

impl IdentityRegistry {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Register a new identity and return its record plus the bearer token.
    pub async fn register(&self, name: &str, description: &str) -> Result<(IdentityRecord, String)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BraidError::Validation("identity name is empty".into()));
        }
        let description = description.trim();

        let token = generate_token();
        let record = self
            .store
            .create_identity(name, description, &hash_token(&token))?;

        // Seed profile memory so the identity is retrievable by name
        // before their first conversation.
        self.store
            .append(
                record.id,
                &format!("User name: {}", name),
                MemoryKind::Profile,
            )
            .await?;
        if !description.is_empty() {
            self.store
                .append(
                    record.id,
                    &format!("User description: {}", description),
                    MemoryKind::Profile,
                )
                .await?;
        }

        info!(id = %record.id, name, "registered identity");
        Ok((record, token))
    }

    /// Resolve a bearer token to an identity, if it matches one.
    pub fn authenticate(&self, token: &str) -> Result<Option<IdentityId>> {
        self.store.find_identity_by_token_hash(&hash_token(token))
    }

    /// Update an identity's name and description, and append the new profile
    /// to memory. Earlier profile items stay in the log unchanged.
    pub async fn update_profile(
        &self,
        id: IdentityId,
        name: &str,
        description: &str,
    ) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BraidError::Validation("identity name is empty".into()));
        }
        let description = description.trim();
        self.store.set_identity_profile(id, name, description)?;
        self.store
            .append(id, &format!("User name: {}", name), MemoryKind::Profile)
            .await?;
        if !description.is_empty() {
            self.store
                .append(
                    id,
                    &format!("User description: {}", description),
                    MemoryKind::Profile,
                )
                .await?;
        }
        Ok(())
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn hash_token(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}
