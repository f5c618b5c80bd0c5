use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use braid_core::{
    BraidError, IdentityId, Message, MessageContent, Result, Role, SessionId, clip_chars,
};
use braid_llm::EmbeddingProvider;

use crate::model::{IdentityRecord, MemoryItem, MemoryKind, SessionRecord};

/// Longest text a single memory item may carry; longer input is clipped
/// before embedding so one runaway turn cannot bloat the store.
const DEFAULT_MAX_CHARS: usize = 800;

/// Persistent store for identities, append-only memory items, authorization
/// edges, and session logs. One SQLite database holds all of them; all writes
/// serialize through a single connection, which also makes per-owner append
/// positions and per-session ordinals trivially monotonic.
pub struct MemoryStore {
    db: Arc<Mutex<Connection>>,
    embedder: Arc<dyn EmbeddingProvider>,
    max_chars: usize,
}

impl MemoryStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        info!(?path, "opening memory store");

        let conn = Connection::open(path).map_err(db_err)?;

        // Enable WAL mode for concurrent reads
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS identities (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                token_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS memory_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id TEXT NOT NULL REFERENCES identities(id),
                kind TEXT NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL,
                position INTEGER NOT NULL,
                UNIQUE(owner_id, position)
            );

            CREATE TABLE IF NOT EXISTS edges (
                from_id TEXT NOT NULL REFERENCES identities(id),
                to_id TEXT NOT NULL REFERENCES identities(id),
                created_at TEXT NOT NULL,
                PRIMARY KEY (from_id, to_id)
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL REFERENCES identities(id),
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS session_messages (
                session_id TEXT NOT NULL REFERENCES sessions(id),
                ordinal INTEGER NOT NULL,
                message_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (session_id, ordinal)
            );

            CREATE INDEX IF NOT EXISTS idx_items_owner ON memory_items(owner_id, position);
            CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_owner ON sessions(owner_id);
            CREATE INDEX IF NOT EXISTS idx_identities_token ON identities(token_hash);
            ",
        )
        .map_err(db_err)?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            embedder,
            max_chars: DEFAULT_MAX_CHARS,
        })
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory(embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        Self::open(Path::new(":memory:"), embedder)
    }

    /// Override the per-item text clip length.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.max(1);
        self
    }

    /// Get a reference to the raw database connection (for advanced queries).
    pub fn db(&self) -> parking_lot::MutexGuard<'_, Connection> {
        self.db.lock()
    }

    pub(crate) fn db_handle(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.db)
    }

    /// The embedding provider this store writes with.
    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        Arc::clone(&self.embedder)
    }

    // ── Memory items ───────────────────────────────────────────

    /// Embed `text` and append it to `owner`'s log.
    ///
    /// All-or-nothing: if the embedding provider fails, nothing is persisted.
    /// The item's `position` is assigned inside the insert transaction, so
    /// positions are gapless and monotonic per owner.
    pub async fn append(
        &self,
        owner: IdentityId,
        text: &str,
        kind: MemoryKind,
    ) -> Result<MemoryItem> {
        let text = clip_chars(text.trim(), self.max_chars);
        if text.is_empty() {
            return Err(BraidError::Validation("empty memory text".into()));
        }
        if !self.identity_exists(owner)? {
            return Err(BraidError::UnknownIdentity(owner));
        }

        // Embed before taking the write lock.
        let mut vectors = self.embedder.embed(&[text]).await?;
        if vectors.is_empty() {
            return Err(BraidError::Provider("embedder returned no vector".into()));
        }
        let mut embedding = vectors.remove(0);
        l2_normalize(&mut embedding);

        let created_at = Utc::now();
        let mut conn = self.db.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let position: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM memory_items WHERE owner_id = ?1",
                rusqlite::params![owner.to_string()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        tx.execute(
            "INSERT INTO memory_items (owner_id, kind, text, embedding, created_at, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                owner.to_string(),
                kind.as_str(),
                text,
                embedding_to_blob(&embedding),
                created_at.to_rfc3339(),
                position,
            ],
        )
        .map_err(db_err)?;
        let id = tx.last_insert_rowid();
        tx.commit().map_err(db_err)?;

        debug!(%owner, position, kind = kind.as_str(), "appended memory item");

        Ok(MemoryItem {
            id,
            owner_id: owner,
            kind,
            text: text.to_string(),
            embedding,
            created_at,
            position,
        })
    }

    /// Load all of `owner`'s memory items in insertion order.
    ///
    /// This is the candidate pool for retrieval: one call loads the owner's
    /// full embedding matrix, so scoring never goes back to the database
    /// per-candidate.
    pub fn load_all(&self, owner: IdentityId) -> Result<Vec<MemoryItem>> {
        let conn = self.db.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, kind, text, embedding, created_at, position
                 FROM memory_items WHERE owner_id = ?1 ORDER BY position",
            )
            .map_err(db_err)?;
        let items = stmt
            .query_map(rusqlite::params![owner.to_string()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;

        items
            .into_iter()
            .map(|(id, kind, text, blob, created_at, position)| {
                Ok(MemoryItem {
                    id,
                    owner_id: owner,
                    kind: MemoryKind::parse(&kind),
                    text,
                    embedding: blob_to_embedding(&blob)?,
                    created_at: parse_ts(&created_at)?,
                    position,
                })
            })
            .collect()
    }

    /// Number of memory items owned by `owner`.
    pub fn count_items(&self, owner: IdentityId) -> Result<usize> {
        let conn = self.db.lock();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM memory_items WHERE owner_id = ?1",
                rusqlite::params![owner.to_string()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count as usize)
    }

    // ── Identities ─────────────────────────────────────────────

    /// Persist a new identity. The caller supplies the token hash; the raw
    /// token never reaches this layer.
    pub fn create_identity(
        &self,
        name: &str,
        description: &str,
        token_hash: &str,
    ) -> Result<IdentityRecord> {
        let record = IdentityRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        };
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO identities (id, name, description, token_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                record.id.to_string(),
                record.name,
                record.description,
                token_hash,
                record.created_at.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(record)
    }

    pub fn identity_exists(&self, id: IdentityId) -> Result<bool> {
        let conn = self.db.lock();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM identities WHERE id = ?1",
                rusqlite::params![id.to_string()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    pub fn get_identity(&self, id: IdentityId) -> Result<Option<IdentityRecord>> {
        let conn = self.db.lock();
        let row = conn
            .query_row(
                "SELECT name, description, created_at FROM identities WHERE id = ?1",
                rusqlite::params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .map(Some)
            .or_else(ignore_not_found)
            .map_err(db_err)?;
        match row {
            Some((name, description, created_at)) => Ok(Some(IdentityRecord {
                id,
                name,
                description,
                created_at: parse_ts(&created_at)?,
            })),
            None => Ok(None),
        }
    }

    /// Resolve a bearer token hash to an identity id.
    pub fn find_identity_by_token_hash(&self, token_hash: &str) -> Result<Option<IdentityId>> {
        let conn = self.db.lock();
        let id: Option<String> = conn
            .query_row(
                "SELECT id FROM identities WHERE token_hash = ?1",
                rusqlite::params![token_hash],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(ignore_not_found)
            .map_err(db_err)?;
        match id {
            Some(raw) => Ok(Some(parse_uuid(&raw)?)),
            None => Ok(None),
        }
    }

    /// Update an identity's mutable fields (name and description).
    pub fn set_identity_profile(
        &self,
        id: IdentityId,
        name: &str,
        description: &str,
    ) -> Result<()> {
        let conn = self.db.lock();
        let changed = conn
            .execute(
                "UPDATE identities SET name = ?2, description = ?3 WHERE id = ?1",
                rusqlite::params![id.to_string(), name, description],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(BraidError::UnknownIdentity(id));
        }
        Ok(())
    }

    // ── Sessions ───────────────────────────────────────────────

    /// Create a session owned by `owner`.
    pub fn create_session(&self, owner: IdentityId, name: &str) -> Result<SessionRecord> {
        if !self.identity_exists(owner)? {
            return Err(BraidError::UnknownIdentity(owner));
        }
        let record = SessionRecord {
            id: Uuid::new_v4(),
            owner_id: owner,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO sessions (id, owner_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                record.id.to_string(),
                owner.to_string(),
                record.name,
                record.created_at.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(record)
    }

    /// The identity that owns `session`, if the session exists.
    pub fn session_owner(&self, session: SessionId) -> Result<Option<IdentityId>> {
        let conn = self.db.lock();
        let owner: Option<String> = conn
            .query_row(
                "SELECT owner_id FROM sessions WHERE id = ?1",
                rusqlite::params![session.to_string()],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(ignore_not_found)
            .map_err(db_err)?;
        match owner {
            Some(raw) => Ok(Some(parse_uuid(&raw)?)),
            None => Ok(None),
        }
    }

    /// All of `owner`'s sessions, newest first.
    pub fn list_sessions(&self, owner: IdentityId) -> Result<Vec<SessionRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, created_at FROM sessions
                 WHERE owner_id = ?1 ORDER BY created_at DESC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(rusqlite::params![owner.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        rows.into_iter()
            .map(|(id, name, created_at)| {
                Ok(SessionRecord {
                    id: parse_uuid(&id)?,
                    owner_id: owner,
                    name,
                    created_at: parse_ts(&created_at)?,
                })
            })
            .collect()
    }

    /// Append a message to its session's log. The ordinal is assigned inside
    /// the transaction: acceptance order is conversation order.
    pub fn append_session_message(&self, message: &Message) -> Result<i64> {
        let content = serde_json::to_string(&message.content)?;
        let mut conn = self.db.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let exists: i64 = tx
            .query_row(
                "SELECT count(*) FROM sessions WHERE id = ?1",
                rusqlite::params![message.session_id.to_string()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        if exists == 0 {
            return Err(BraidError::Validation(format!(
                "unknown session: {}",
                message.session_id
            )));
        }
        let ordinal: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(ordinal) + 1, 0) FROM session_messages WHERE session_id = ?1",
                rusqlite::params![message.session_id.to_string()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        tx.execute(
            "INSERT INTO session_messages (session_id, ordinal, message_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                message.session_id.to_string(),
                ordinal,
                message.id.to_string(),
                role_str(message.role),
                content,
                message.timestamp.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(ordinal)
    }

    /// Load a session's full message log in append order.
    pub fn load_session_messages(&self, session: SessionId) -> Result<Vec<Message>> {
        let conn = self.db.lock();
        let mut stmt = conn
            .prepare(
                "SELECT message_id, role, content, created_at
                 FROM session_messages WHERE session_id = ?1 ORDER BY ordinal",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(rusqlite::params![session.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        rows.into_iter()
            .map(|(message_id, role, content, created_at)| {
                let content: MessageContent = serde_json::from_str(&content)?;
                Ok(Message {
                    id: parse_uuid(&message_id)?,
                    session_id: session,
                    role: parse_role(&role)?,
                    content,
                    timestamp: parse_ts(&created_at)?,
                })
            })
            .collect()
    }

    /// Number of messages in a session's log.
    pub fn message_count(&self, session: SessionId) -> Result<usize> {
        let conn = self.db.lock();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM session_messages WHERE session_id = ?1",
                rusqlite::params![session.to_string()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count as usize)
    }
}

// ── Encoding helpers ───────────────────────────────────────────

/// Serialize an embedding as little-endian f32 bytes.
pub(crate) fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize an embedding from LE f32 bytes.
pub(crate) fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(BraidError::Memory(format!(
            "corrupt embedding blob of {} bytes",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Normalize a vector to unit length in place. Stored vectors are unit, so a
/// dot product against a unit query is the cosine similarity.
pub(crate) fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v {
            *x /= norm;
        }
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::Human => "human",
        Role::Ai => "ai",
        Role::Tool => "tool",
    }
}

fn parse_role(s: &str) -> Result<Role> {
    match s {
        "system" => Ok(Role::System),
        "human" => Ok(Role::Human),
        "ai" => Ok(Role::Ai),
        "tool" => Ok(Role::Tool),
        other => Err(BraidError::Memory(format!("unknown role: {}", other))),
    }
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| BraidError::Memory(format!("bad timestamp {}: {}", s, e)))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| BraidError::Memory(format!("bad uuid {}: {}", s, e)))
}

pub(crate) fn db_err(e: rusqlite::Error) -> BraidError {
    match e {
        rusqlite::Error::SqliteFailure(err, ref msg)
            if err.code == rusqlite::ErrorCode::DatabaseBusy
                || err.code == rusqlite::ErrorCode::DatabaseLocked =>
        {
            BraidError::Consistency(msg.clone().unwrap_or_else(|| err.to_string()))
        }
        other => BraidError::Memory(other.to_string()),
    }
}

fn ignore_not_found<T>(e: rusqlite::Error) -> std::result::Result<Option<T>, rusqlite::Error> {
    match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    }
}
