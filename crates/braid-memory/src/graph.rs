use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use tracing::debug;
use uuid::Uuid;

use braid_core::{BraidError, IdentityId, Result};

use crate::model::{RelationshipUpdate, RelationshipView};
use crate::store::{MemoryStore, db_err};

/// The directed authorization graph over identities.
///
/// An edge `from -> to` means `from` has authorized `to`'s agent to read
/// `from`'s memory. `exposed_to` and `amplify_from` are the two directions of
/// the same edge set; an update to either side is realized as a delta against
/// the current edges, applied in one transaction, so edges owned by third
/// parties are never clobbered.
pub struct RelationshipGraph {
    db: Arc<Mutex<Connection>>,
}

impl RelationshipGraph {
    /// A graph view over the store's database.
    pub fn new(store: &MemoryStore) -> Self {
        Self {
            db: store.db_handle(),
        }
    }

    /// Both directions of `id`'s edges, with sorted id lists.
    pub fn get_relationships(&self, id: IdentityId) -> Result<RelationshipView> {
        let conn = self.db.lock();
        require_identity(&conn, id)?;
        let exposed_to = edge_query(
            &conn,
            "SELECT to_id FROM edges WHERE from_id = ?1 ORDER BY to_id",
            id,
        )?;
        let amplify_from = edge_query(
            &conn,
            "SELECT from_id FROM edges WHERE to_id = ?1 ORDER BY from_id",
            id,
        )?;
        Ok(RelationshipView {
            exposed_to,
            amplify_from,
        })
    }

    /// Replace one or both sides of `id`'s authorization lists.
    ///
    /// Target lists are treated as sets: duplicates collapse silently and
    /// re-applying the same update is a no-op. Self-authorization is rejected;
    /// unknown target ids fail the whole update with nothing applied.
    pub fn update(&self, id: IdentityId, update: RelationshipUpdate) -> Result<RelationshipView> {
        let mut conn = self.db.lock();
        let tx = conn.transaction().map_err(db_err)?;
        require_identity(&tx, id)?;

        if let Some(targets) = &update.exposed_to {
            let desired = validated_set(&tx, id, targets)?;
            let current: BTreeSet<IdentityId> = edge_query(
                &tx,
                "SELECT to_id FROM edges WHERE from_id = ?1 ORDER BY to_id",
                id,
            )?
            .into_iter()
            .collect();
            for added in desired.difference(&current) {
                insert_edge(&tx, id, *added)?;
            }
            for removed in current.difference(&desired) {
                delete_edge(&tx, id, *removed)?;
            }
            debug!(%id, count = desired.len(), "rewrote exposed_to edges");
        }

        if let Some(sources) = &update.amplify_from {
            // "I want to read X" is the inverse edge X -> id.
            let desired = validated_set(&tx, id, sources)?;
            let current: BTreeSet<IdentityId> = edge_query(
                &tx,
                "SELECT from_id FROM edges WHERE to_id = ?1 ORDER BY from_id",
                id,
            )?
            .into_iter()
            .collect();
            for added in desired.difference(&current) {
                insert_edge(&tx, *added, id)?;
            }
            for removed in current.difference(&desired) {
                delete_edge(&tx, *removed, id)?;
            }
            debug!(%id, count = desired.len(), "rewrote amplify_from edges");
        }

        let exposed_to = edge_query(
            &tx,
            "SELECT to_id FROM edges WHERE from_id = ?1 ORDER BY to_id",
            id,
        )?;
        let amplify_from = edge_query(
            &tx,
            "SELECT from_id FROM edges WHERE to_id = ?1 ORDER BY from_id",
            id,
        )?;
        tx.commit().map_err(db_err)?;

        Ok(RelationshipView {
            exposed_to,
            amplify_from,
        })
    }
}

/// Deduplicate targets, reject self-loops, and fail on unknown ids.
fn validated_set(
    tx: &Transaction<'_>,
    id: IdentityId,
    targets: &[IdentityId],
) -> Result<BTreeSet<IdentityId>> {
    let set: BTreeSet<IdentityId> = targets.iter().copied().collect();
    if set.contains(&id) {
        return Err(BraidError::Validation(
            "an identity cannot authorize itself".into(),
        ));
    }
    for target in &set {
        require_identity(tx, *target)?;
    }
    Ok(set)
}

fn require_identity(conn: &Connection, id: IdentityId) -> Result<()> {
    let count: i64 = conn
        .query_row(
            "SELECT count(*) FROM identities WHERE id = ?1",
            rusqlite::params![id.to_string()],
            |row| row.get(0),
        )
        .map_err(db_err)?;
    if count == 0 {
        return Err(BraidError::UnknownIdentity(id));
    }
    Ok(())
}

fn edge_query(conn: &Connection, sql: &str, id: IdentityId) -> Result<Vec<IdentityId>> {
    let mut stmt = conn.prepare(sql).map_err(db_err)?;
    let raw = stmt
        .query_map(rusqlite::params![id.to_string()], |row| {
            row.get::<_, String>(0)
        })
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    raw.into_iter()
        .map(|s| {
            Uuid::parse_str(&s).map_err(|e| BraidError::Memory(format!("bad uuid {}: {}", s, e)))
        })
        .collect()
}

fn insert_edge(conn: &Connection, from: IdentityId, to: IdentityId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO edges (from_id, to_id, created_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![from.to_string(), to.to_string(), Utc::now().to_rfc3339()],
    )
    .map_err(db_err)?;
    Ok(())
}

fn delete_edge(conn: &Connection, from: IdentityId, to: IdentityId) -> Result<()> {
    conn.execute(
        "DELETE FROM edges WHERE from_id = ?1 AND to_id = ?2",
        rusqlite::params![from.to_string(), to.to_string()],
    )
    .map_err(db_err)?;
    Ok(())
}
