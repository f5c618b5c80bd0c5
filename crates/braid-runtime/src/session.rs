use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex as TokioMutex, RwLock};

use braid_core::{IdentityId, Result, SessionId};
use braid_memory::{MemoryStore, SessionRecord};

/// Session metadata and per-session run locks.
///
/// Metadata lives in the store; this layer adds the lock map that serializes
/// turns. Holding a session's run lock for the whole turn means two messages
/// to the same session can never interleave their reads and writes.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<MemoryStore>,
    run_locks: Arc<RwLock<HashMap<SessionId, Arc<TokioMutex<()>>>>>,
}

impl SessionManager {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            run_locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a session owned by `owner`.
    pub fn create(&self, owner: IdentityId, name: &str) -> Result<SessionRecord> {
        self.store.create_session(owner, name)
    }

    /// The identity that owns a session, if it exists.
    pub fn owner(&self, session: SessionId) -> Result<Option<IdentityId>> {
        self.store.session_owner(session)
    }

    /// All of `owner`'s sessions, newest first.
    pub fn list(&self, owner: IdentityId) -> Result<Vec<SessionRecord>> {
        self.store.list_sessions(owner)
    }

    /// Number of messages in a session's log.
    pub fn message_count(&self, session: SessionId) -> Result<usize> {
        self.store.message_count(session)
    }

    /// Get the per-session run lock. Callers hold the guard for the duration
    /// of their turn to prevent concurrent runs on the same session.
    pub async fn run_lock(&self, session_id: SessionId) -> Arc<TokioMutex<()>> {
        // Fast path: lock already exists
        {
            let locks = self.run_locks.read().await;
            if let Some(lock) = locks.get(&session_id) {
                return Arc::clone(lock);
            }
        }
        // Slow path: create a new lock
        let mut locks = self.run_locks.write().await;
        Arc::clone(
            locks
                .entry(session_id)
                .or_insert_with(|| Arc::new(TokioMutex::new(()))),
        )
    }
}
