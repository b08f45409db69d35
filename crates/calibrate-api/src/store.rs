//! `SQLite` storage for the system of record.
//!
//! Records are kept per table as JSON documents. Writes are last-writer-wins
//! on the client-assigned `updatedAt`, so a retried or reordered push of an
//! older version never overwrites a newer one.

use std::path::Path;
use std::sync::Arc;

use calibrate_core::util::{format_timestamp, parse_timestamp};
use calibrate_core::EntityKind;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::AppError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    entity_table TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    received_at TEXT NOT NULL,
    PRIMARY KEY (entity_table, id)
);
";

/// Result of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The incoming document is now stored
    Applied,
    /// A newer version was already stored and kept
    Stale,
}

#[derive(Clone)]
pub struct RecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl RecordStore {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                AppError::internal(format!("failed to create {}: {error}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, AppError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Store `document` unless a newer version of the record is already held.
    pub async fn upsert(
        &self,
        kind: EntityKind,
        id: &str,
        document: &Value,
    ) -> Result<WriteOutcome, AppError> {
        let incoming = document_version(document)?;
        let conn = self.conn.lock().await;

        let stored: Option<String> = conn
            .query_row(
                "SELECT updated_at FROM records WHERE entity_table = ?1 AND id = ?2",
                params![kind.table(), id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(stored) = stored.as_deref().and_then(parse_timestamp) {
            if stored > incoming {
                return Ok(WriteOutcome::Stale);
            }
        }

        conn.execute(
            "INSERT INTO records (entity_table, id, data, updated_at, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(entity_table, id) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at,
                received_at = excluded.received_at",
            params![
                kind.table(),
                id,
                serde_json::to_string(document)?,
                format_timestamp(&incoming),
                format_timestamp(&Utc::now()),
            ],
        )?;
        Ok(WriteOutcome::Applied)
    }

    /// Remove a record; returns whether it existed
    pub async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool, AppError> {
        let conn = self.conn.lock().await;
        let rows = conn.execute(
            "DELETE FROM records WHERE entity_table = ?1 AND id = ?2",
            params![kind.table(), id],
        )?;
        Ok(rows > 0)
    }

    pub async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Value>, AppError> {
        let conn = self.conn.lock().await;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM records WHERE entity_table = ?1 AND id = ?2",
                params![kind.table(), id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data.map(|data| serde_json::from_str(&data)).transpose()?)
    }

    /// Every record of a table, oldest version first
    pub async fn list(&self, kind: EntityKind) -> Result<Vec<Value>, AppError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT data FROM records WHERE entity_table = ?1 ORDER BY updated_at, id",
        )?;
        let rows = stmt
            .query_map(params![kind.table()], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.iter()
            .map(|data| serde_json::from_str(data).map_err(AppError::from))
            .collect()
    }
}

fn document_version(document: &Value) -> Result<DateTime<Utc>, AppError> {
    let raw = document
        .get("updatedAt")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::bad_request("record must include an `updatedAt` timestamp"))?;
    parse_timestamp(raw)
        .ok_or_else(|| AppError::bad_request(format!("`updatedAt` is not a valid timestamp: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn document(id: &str, name: &str, updated_at: &str) -> Value {
        json!({ "id": id, "name": name, "createdAt": updated_at, "updatedAt": updated_at })
    }

    #[tokio::test]
    async fn upsert_then_read_back() {
        let store = RecordStore::open_in_memory().unwrap();
        let doc = document("c-1", "Acme", "2026-03-01T10:00:00.000000Z");

        let outcome = store.upsert(EntityKind::Customer, "c-1", &doc).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Applied);
        assert_eq!(store.get(EntityKind::Customer, "c-1").await.unwrap(), Some(doc.clone()));
        assert_eq!(store.list(EntityKind::Customer).await.unwrap(), vec![doc]);
        assert!(store.list(EntityKind::Tool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn older_version_does_not_overwrite_newer() {
        let store = RecordStore::open_in_memory().unwrap();
        let newer = document("c-1", "Acme Corp", "2026-03-02T10:00:00.000000Z");
        let older = document("c-1", "Acme", "2026-03-01T10:00:00.000000Z");

        store.upsert(EntityKind::Customer, "c-1", &newer).await.unwrap();
        let outcome = store.upsert(EntityKind::Customer, "c-1", &older).await.unwrap();

        assert_eq!(outcome, WriteOutcome::Stale);
        assert_eq!(store.get(EntityKind::Customer, "c-1").await.unwrap(), Some(newer));
    }

    #[tokio::test]
    async fn same_version_is_reapplied() {
        let store = RecordStore::open_in_memory().unwrap();
        let doc = document("c-1", "Acme", "2026-03-01T10:00:00.000000Z");

        store.upsert(EntityKind::Customer, "c-1", &doc).await.unwrap();
        let outcome = store.upsert(EntityKind::Customer, "c-1", &doc).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Applied);
        assert_eq!(store.list(EntityKind::Customer).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_version_is_rejected() {
        let store = RecordStore::open_in_memory().unwrap();
        let result = store
            .upsert(EntityKind::Customer, "c-1", &json!({ "id": "c-1" }))
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = RecordStore::open_in_memory().unwrap();
        let doc = document("t-1", "Ring", "2026-03-01T10:00:00.000000Z");
        store.upsert(EntityKind::Tool, "t-1", &doc).await.unwrap();

        assert!(store.delete(EntityKind::Tool, "t-1").await.unwrap());
        assert!(!store.delete(EntityKind::Tool, "t-1").await.unwrap());
        assert_eq!(store.get(EntityKind::Tool, "t-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn tables_are_isolated() {
        let store = RecordStore::open_in_memory().unwrap();
        let doc = document("x-1", "Shared id", "2026-03-01T10:00:00.000000Z");
        store.upsert(EntityKind::Customer, "x-1", &doc).await.unwrap();

        assert_eq!(store.get(EntityKind::Equipment, "x-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn records_persist_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records.db");
        let doc = document("c-1", "Acme", "2026-03-01T10:00:00.000000Z");

        {
            let store = RecordStore::open(&path).unwrap();
            store.upsert(EntityKind::Customer, "c-1", &doc).await.unwrap();
        }

        let store = RecordStore::open(&path).unwrap();
        assert_eq!(store.get(EntityKind::Customer, "c-1").await.unwrap(), Some(doc));
    }
}
