//! Database connection management

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use super::migrations;
use crate::error::{Error, Result};

/// Owned `SQLite` connection with the Calibrate schema applied
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open the database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically. A file that cannot be created, opened,
    /// configured or migrated (corrupt, read-only, not a database) is reported
    /// as [`Error::StorageUnavailable`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|error| {
                Error::StorageUnavailable(format!(
                    "cannot create directory {}: {error}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(|error| {
            Error::StorageUnavailable(format!("cannot open {}: {error}", path.display()))
        })?;

        let mut database = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        database
            .configure()
            .and_then(|()| database.migrate())
            .map_err(|error| match error {
                Error::StorageUnavailable(_) => error,
                other => Error::StorageUnavailable(format!(
                    "cannot use {}: {other}",
                    path.display()
                )),
            })?;
        Ok(database)
    }

    /// Open an in-memory database (tests and memory-only degraded mode)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|error| Error::StorageUnavailable(error.to_string()))?;

        let mut database = Self { conn, path: None };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` for durability
    fn configure(&self) -> Result<()> {
        let journal = self
            .conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0));
        // In-memory databases report journal_mode=memory and ignore WAL.
        if self.path.is_some() {
            journal?;
        }
        self.conn.execute_batch("PRAGMA synchronous = FULL;")?;
        self.conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        Ok(())
    }

    /// Run database migrations
    fn migrate(&mut self) -> Result<()> {
        migrations::run(&mut self.conn)
    }

    /// File backing this database, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get a mutable reference to the underlying connection (for transactions)
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}
