//! Database migrations

use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0)
        })
        .optional()?
        .flatten()
        .unwrap_or(0);

    Ok(version)
}

/// Apply one migration's statements inside a single transaction
fn apply(conn: &mut Connection, version: i32, statements: &str) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(statements)?;
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Migration to version 1: entity tables and their lookup indexes
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    apply(
        conn,
        1,
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            dirty INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_customers_dirty ON customers(dirty);
        CREATE INDEX IF NOT EXISTS idx_customers_name ON customers(json_extract(data, '$.name'));

        CREATE TABLE IF NOT EXISTS equipment (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            dirty INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_equipment_dirty ON equipment(dirty);
        CREATE INDEX IF NOT EXISTS idx_equipment_customer ON equipment(json_extract(data, '$.customerId'));
        CREATE INDEX IF NOT EXISTS idx_equipment_type ON equipment(json_extract(data, '$.type'));
        CREATE INDEX IF NOT EXISTS idx_equipment_serial ON equipment(json_extract(data, '$.serialNumber'));

        CREATE TABLE IF NOT EXISTS tools (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            dirty INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tools_dirty ON tools(dirty);
        CREATE INDEX IF NOT EXISTS idx_tools_category ON tools(json_extract(data, '$.category'));
        CREATE INDEX IF NOT EXISTS idx_tools_status ON tools(json_extract(data, '$.status'));
        CREATE INDEX IF NOT EXISTS idx_tools_serial ON tools(json_extract(data, '$.serialNumber'));

        CREATE TABLE IF NOT EXISTS calibrations (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            dirty INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_calibrations_dirty ON calibrations(dirty);
        CREATE INDEX IF NOT EXISTS idx_calibrations_customer ON calibrations(json_extract(data, '$.customerId'));
        CREATE INDEX IF NOT EXISTS idx_calibrations_equipment ON calibrations(json_extract(data, '$.equipmentId'));
        CREATE INDEX IF NOT EXISTS idx_calibrations_type ON calibrations(json_extract(data, '$.type'));",
    )
}

/// Migration to version 2: durable mutation queue
fn migrate_v2(conn: &mut Connection) -> Result<()> {
    apply(
        conn,
        CURRENT_VERSION,
        "CREATE TABLE IF NOT EXISTS mutation_queue (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            operation TEXT NOT NULL,
            enqueued_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_mutation_queue_entity
            ON mutation_queue(entity_type, entity_id);",
    )
}
