//! Durable mutation queue
//!
//! Every local write appends an entry naming the entity and the operation to
//! replay against the remote store. Entries live in the same `SQLite` file as
//! the entity tables and are removed only after the remote store confirmed
//! them, so delivery is at-least-once across crashes and restarts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{EntityId, EntityKind};
use crate::util::{format_timestamp, now_micros, parse_timestamp};

/// Write operation recorded for replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!("unknown operation: {other}"))),
        }
    }
}

/// One pending remote write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    /// Position in the queue (monotonic, never reused)
    pub seq: i64,
    pub kind: EntityKind,
    pub entity_id: EntityId,
    pub operation: Operation,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueEntry {
    /// Entity addressed by this entry
    pub fn key(&self) -> (EntityKind, EntityId) {
        (self.kind, self.entity_id.clone())
    }
}

/// Mutation queue over a borrowed connection
pub struct MutationQueue<'a> {
    conn: &'a Connection,
}

impl<'a> MutationQueue<'a> {
    /// Create a queue handle over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append an entry; duplicates for the same entity are kept in order
    pub fn enqueue(
        &self,
        kind: EntityKind,
        entity_id: &EntityId,
        operation: Operation,
    ) -> Result<QueueEntry> {
        let enqueued_at = now_micros();
        self.conn.execute(
            "INSERT INTO mutation_queue (entity_type, entity_id, operation, enqueued_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                kind.as_str(),
                entity_id.as_str(),
                operation.as_str(),
                format_timestamp(&enqueued_at)
            ],
        )?;

        Ok(QueueEntry {
            seq: self.conn.last_insert_rowid(),
            kind,
            entity_id: entity_id.clone(),
            operation,
            enqueued_at,
        })
    }

    /// Pending entries in enqueue order
    ///
    /// A queue that fails to decode is reset to empty with a warning; the
    /// dirty flags on the entity tables still carry what needs pushing.
    pub fn list(&self) -> Result<Vec<QueueEntry>> {
        match self.decode_all() {
            Ok(entries) => Ok(entries),
            Err(Error::QueueCorrupt(reason)) => {
                tracing::warn!("Mutation queue is corrupt ({reason}); resetting to empty");
                self.clear()?;
                Ok(Vec::new())
            }
            Err(error) => Err(error),
        }
    }

    /// Remove the oldest entry matching the triple; no-op when absent
    pub fn remove(
        &self,
        kind: EntityKind,
        entity_id: &EntityId,
        operation: Operation,
    ) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM mutation_queue WHERE seq = (
                SELECT MIN(seq) FROM mutation_queue
                WHERE entity_type = ?1 AND entity_id = ?2 AND operation = ?3
            )",
            params![kind.as_str(), entity_id.as_str(), operation.as_str()],
        )?;
        Ok(rows > 0)
    }

    /// Remove one exact entry by its sequence number
    pub fn remove_entry(&self, seq: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM mutation_queue WHERE seq = ?1", params![seq])?;
        Ok(rows > 0)
    }

    /// Count of pending entries
    pub fn size(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM mutation_queue", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Drop every pending entry
    pub fn clear(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM mutation_queue", [])?)
    }

    fn decode_all(&self) -> Result<Vec<QueueEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, entity_type, entity_id, operation, enqueued_at
             FROM mutation_queue
             ORDER BY seq ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(seq, kind, entity_id, operation, enqueued_at)| {
                let corrupt = |what: &str| Error::QueueCorrupt(format!("entry {seq}: {what}"));
                Ok(QueueEntry {
                    seq,
                    kind: kind
                        .parse()
                        .map_err(|_| corrupt(&format!("unknown entity type {kind:?}")))?,
                    entity_id: entity_id
                        .parse()
                        .map_err(|_| corrupt("empty entity id"))?,
                    operation: operation
                        .parse()
                        .map_err(|_| corrupt(&format!("unknown operation {operation:?}")))?,
                    enqueued_at: parse_timestamp(&enqueued_at)
                        .ok_or_else(|| corrupt(&format!("invalid timestamp {enqueued_at:?}")))?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_enqueue_and_list_in_order() {
        let db = setup();
        let queue = MutationQueue::new(db.connection());
        let id = EntityId::new();

        queue.enqueue(EntityKind::Customer, &id, Operation::Create).unwrap();
        queue.enqueue(EntityKind::Customer, &id, Operation::Update).unwrap();
        queue.enqueue(EntityKind::Customer, &id, Operation::Update).unwrap();

        let ops: Vec<Operation> = queue.list().unwrap().into_iter().map(|e| e.operation).collect();
        assert_eq!(
            ops,
            vec![Operation::Create, Operation::Update, Operation::Update]
        );
        assert_eq!(queue.size().unwrap(), 3);
    }

    #[test]
    fn test_remove_takes_oldest_match_only() {
        let db = setup();
        let queue = MutationQueue::new(db.connection());
        let id = EntityId::new();

        let first = queue.enqueue(EntityKind::Tool, &id, Operation::Update).unwrap();
        let second = queue.enqueue(EntityKind::Tool, &id, Operation::Update).unwrap();

        assert!(queue.remove(EntityKind::Tool, &id, Operation::Update).unwrap());
        let remaining = queue.list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].seq, second.seq);
        assert!(first.seq < second.seq);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let db = setup();
        let queue = MutationQueue::new(db.connection());
        assert!(!queue
            .remove(EntityKind::Tool, &EntityId::new(), Operation::Delete)
            .unwrap());
        assert!(!queue.remove_entry(42).unwrap());
    }

    #[test]
    fn test_queue_survives_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("queue.db");
        let ids: Vec<EntityId> = (0..5).map(|_| EntityId::new()).collect();

        {
            let db = Database::open(&path).unwrap();
            let queue = MutationQueue::new(db.connection());
            for id in &ids {
                queue.enqueue(EntityKind::Equipment, id, Operation::Create).unwrap();
            }
        }

        let db = Database::open(&path).unwrap();
        let queue = MutationQueue::new(db.connection());
        let listed: Vec<EntityId> = queue
            .list()
            .unwrap()
            .into_iter()
            .map(|entry| entry.entity_id)
            .collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn test_corrupt_queue_resets_to_empty() {
        let db = setup();
        let queue = MutationQueue::new(db.connection());
        queue
            .enqueue(EntityKind::Customer, &EntityId::new(), Operation::Create)
            .unwrap();
        db.connection()
            .execute(
                "INSERT INTO mutation_queue (entity_type, entity_id, operation, enqueued_at)
                 VALUES ('customer', 'abc', 'teleport', '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();

        assert!(queue.list().unwrap().is_empty());
        assert_eq!(queue.size().unwrap(), 0);
    }
}
