//! Entity table repository implementation

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{EntityData, EntityId, EntityKind, IndexField, Record};
use crate::util::{format_timestamp, parse_timestamp};

/// Entity stored in one of the tables, payload left as JSON.
///
/// The sync engine works at this level so one code path serves every table.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub kind: EntityKind,
    pub id: EntityId,
    /// Stored document without the local-only `dirty` key
    pub payload: serde_json::Value,
    /// Record version (`updatedAt`)
    pub updated_at: DateTime<Utc>,
    pub dirty: bool,
}

/// `SQLite` repository over the per-entity tables
///
/// Borrows a connection, so the same repository runs on a plain connection or
/// inside a transaction.
pub struct RecordRepository<'a> {
    conn: &'a Connection,
}

impl<'a> RecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Get a record by ID
    pub fn get<T: EntityData>(&self, id: &EntityId) -> Result<Option<Record<T>>> {
        let sql = format!(
            "SELECT data, dirty FROM {} WHERE id = ?1",
            T::KIND.table()
        );
        let row = self
            .conn
            .query_row(&sql, params![id.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .optional()?;

        row.map(|(data, dirty)| decode_record(&data, dirty))
            .transpose()
    }

    /// List every record of a table, oldest first
    pub fn list<T: EntityData>(&self) -> Result<Vec<Record<T>>> {
        let sql = format!(
            "SELECT data, dirty FROM {} ORDER BY created_at, id",
            T::KIND.table()
        );
        self.query_records(&sql, params![])
    }

    /// List records whose indexed field equals `value`
    pub fn list_by_index<T: EntityData>(&self, index: T::Index, value: &str) -> Result<Vec<Record<T>>> {
        let sql = format!(
            "SELECT data, dirty FROM {} WHERE json_extract(data, '{}') = ?1 ORDER BY created_at, id",
            T::KIND.table(),
            index.json_path()
        );
        self.query_records(&sql, params![value])
    }

    /// Insert a new record; an existing id is never overwritten
    pub fn insert<T: EntityData>(&self, record: &Record<T>) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (id, data, dirty, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            T::KIND.table()
        );
        let data = serde_json::to_string(record)?;
        let result = self.conn.execute(
            &sql,
            params![
                record.id.as_str(),
                data,
                i32::from(record.dirty),
                format_timestamp(&record.created_at),
                format_timestamp(&record.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(error, _))
                if error.code == ErrorCode::ConstraintViolation =>
            {
                Err(Error::InvalidInput(format!(
                    "{} {} already exists",
                    T::KIND,
                    record.id
                )))
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Insert or fully replace a record keyed by id
    pub fn upsert<T: EntityData>(&self, record: &Record<T>) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (id, data, dirty, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                data = excluded.data,
                dirty = excluded.dirty,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
            T::KIND.table()
        );
        let data = serde_json::to_string(record)?;
        self.conn.execute(
            &sql,
            params![
                record.id.as_str(),
                data,
                i32::from(record.dirty),
                format_timestamp(&record.created_at),
                format_timestamp(&record.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Timestamps `(created_at, updated_at)` of a stored record
    pub fn timestamps(
        &self,
        kind: EntityKind,
        id: &EntityId,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let sql = format!(
            "SELECT created_at, updated_at FROM {} WHERE id = ?1",
            kind.table()
        );
        let row = self
            .conn
            .query_row(&sql, params![id.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .optional()?;

        row.map(|(created_at, updated_at)| {
            Ok((
                decode_timestamp(kind, id, &created_at)?,
                decode_timestamp(kind, id, &updated_at)?,
            ))
        })
        .transpose()
    }

    /// Delete a record; returns whether a row was removed
    pub fn remove(&self, kind: EntityKind, id: &EntityId) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", kind.table());
        let rows = self.conn.execute(&sql, params![id.as_str()])?;
        Ok(rows > 0)
    }

    /// Get a record by ID without decoding its payload type
    pub fn get_raw(&self, kind: EntityKind, id: &EntityId) -> Result<Option<RawRecord>> {
        let sql = format!(
            "SELECT id, data, dirty, updated_at FROM {} WHERE id = ?1",
            kind.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = self.query_raw(kind, &mut stmt, params![id.as_str()])?;
        Ok(rows.pop())
    }

    /// Every record of a table with its dirty flag set, oldest change first
    pub fn dirty(&self, kind: EntityKind) -> Result<Vec<RawRecord>> {
        let sql = format!(
            "SELECT id, data, dirty, updated_at FROM {} WHERE dirty = 1 ORDER BY updated_at, id",
            kind.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        self.query_raw(kind, &mut stmt, params![])
    }

    /// Count of dirty records in a table
    pub fn dirty_count(&self, kind: EntityKind) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE dirty = 1", kind.table());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Clear the dirty flag if the stored version is still `version`
    ///
    /// Returns `false` when the record changed (or vanished) after the version
    /// was pushed; it then stays dirty for the next cycle.
    pub fn mark_clean(
        &self,
        kind: EntityKind,
        id: &EntityId,
        version: &DateTime<Utc>,
    ) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET dirty = 0 WHERE id = ?1 AND updated_at = ?2",
            kind.table()
        );
        let rows = self
            .conn
            .execute(&sql, params![id.as_str(), format_timestamp(version)])?;
        Ok(rows > 0)
    }

    fn query_records<T: EntityData>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Record<T>>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.iter()
            .map(|(data, dirty)| decode_record(data, *dirty))
            .collect()
    }

    fn query_raw(
        &self,
        kind: EntityKind,
        stmt: &mut rusqlite::Statement<'_>,
        params: impl rusqlite::Params,
    ) -> Result<Vec<RawRecord>> {
        let rows = stmt
            .query_map(params, |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, data, dirty, updated_at)| {
                let id: EntityId = id.parse()?;
                let mut payload: serde_json::Value = serde_json::from_str(&data)?;
                if let Some(object) = payload.as_object_mut() {
                    object.remove("dirty");
                }
                let updated_at = decode_timestamp(kind, &id, &updated_at)?;
                Ok(RawRecord {
                    kind,
                    id,
                    payload,
                    updated_at,
                    dirty: dirty != 0,
                })
            })
            .collect()
    }
}

fn decode_record<T: EntityData>(data: &str, dirty: i64) -> Result<Record<T>> {
    let mut record: Record<T> = serde_json::from_str(data)?;
    record.dirty = dirty != 0;
    Ok(record)
}

fn decode_timestamp(kind: EntityKind, id: &EntityId, value: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(value)
        .ok_or_else(|| Error::InvalidInput(format!("{kind} {id} has invalid timestamp {value}")))
}
