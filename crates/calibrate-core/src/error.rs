//! Error types for calibrate-core

use thiserror::Error;

use crate::models::EntityKind;

/// Result type alias using calibrate-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in calibrate-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Durable storage could not be opened
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// `SQLite` error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity not found for an operation that requires it
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote store refused a specific write
    #[error("Remote store rejected write: {0}")]
    RemoteRejected(String),

    /// A remote call was attempted while effectively offline
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// Persisted mutation queue could not be decoded
    #[error("Mutation queue corrupt: {0}")]
    QueueCorrupt(String),
}

impl Error {
    pub(crate) fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}
