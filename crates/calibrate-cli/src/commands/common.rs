use std::env;
use std::path::PathBuf;

use calibrate_core::config::SyncSettings;
use calibrate_core::{CalibrationService, EntityId, EntityKind, StorageLocation};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CliError;

/// Everything a command needs to reach the local store and the remote.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub db_path: PathBuf,
    pub settings: SyncSettings,
}

impl CliContext {
    pub fn from_env(cli_db_path: Option<PathBuf>) -> Result<Self, CliError> {
        Ok(Self {
            db_path: resolve_db_path(cli_db_path),
            settings: SyncSettings::from_env()?,
        })
    }

    /// Open the local store; the service is not started.
    pub async fn open_service(&self) -> Result<CalibrationService, CliError> {
        tracing::debug!(path = %self.db_path.display(), "Opening local store");
        let service = CalibrationService::from_settings(
            StorageLocation::Path(self.db_path.clone()),
            &self.settings,
        )?;
        service.init().await?;
        Ok(service)
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("CALIBRATE_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("calibrate")
        .join("calibrate.db")
}

pub fn parse_id(kind: EntityKind, raw: &str) -> Result<EntityId, CliError> {
    raw.parse::<EntityId>().map_err(|_| CliError::EmptyId(kind))
}

pub fn not_found(kind: EntityKind, id: &EntityId) -> CliError {
    CliError::NotFound {
        kind,
        id: id.to_string(),
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn sync_marker(dirty: bool) -> &'static str {
    if dirty {
        "*"
    } else {
        " "
    }
}

pub fn truncate(value: &str, max_chars: usize) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp_local(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M UTC").to_string()
}

pub fn format_relative_time(timestamp: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    let secs = (*now - *timestamp).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3_599 => format!("{}m ago", secs / 60),
        3_600..=86_399 => format!("{}h ago", secs / 3_600),
        _ => format!("{}d ago", secs / 86_400),
    }
}
