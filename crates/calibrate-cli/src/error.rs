use std::io;

use calibrate_core::EntityKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] calibrate_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("{0} ID cannot be empty")]
    EmptyId(EntityKind),
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },
    #[error("Invalid results file: {0}")]
    InvalidResults(String),
    #[error(
        "Sync is not configured. Set CALIBRATE_API_URL and CALIBRATE_API_TOKEN to enable it."
    )]
    SyncNotConfigured,
    #[error("Remote store is unreachable; changes stay queued locally")]
    Offline,
    #[error("Sync finished with errors: {0}")]
    SyncFailed(String),
}
