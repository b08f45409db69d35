//! Sync configuration for client apps.
//!
//! Settings come from `CALIBRATE_*` environment variables. Everything is
//! optional: without an API URL the client runs local-only, and without a
//! token sync cycles exit cleanly.

use std::time::Duration;

use crate::connectivity::{DEFAULT_PROBE_INTERVAL, DEFAULT_PROBE_TIMEOUT};
use crate::error::{Error, Result};
use crate::sync::DEFAULT_SYNC_ITEM_TIMEOUT;
use crate::util::{compact_text, is_http_url, normalize_text_option};

pub const ENV_API_URL: &str = "CALIBRATE_API_URL";
pub const ENV_API_TOKEN: &str = "CALIBRATE_API_TOKEN";
pub const ENV_PROBE_INTERVAL_SECS: &str = "CALIBRATE_PROBE_INTERVAL_SECS";
pub const ENV_PROBE_TIMEOUT_SECS: &str = "CALIBRATE_PROBE_TIMEOUT_SECS";
pub const ENV_SYNC_ITEM_TIMEOUT_SECS: &str = "CALIBRATE_SYNC_ITEM_TIMEOUT_SECS";

/// Remote endpoint, credentials and timing for the sync subsystem.
#[derive(Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Base URL of the remote store, without trailing slash
    pub api_url: Option<String>,
    /// Bearer token for the record endpoints
    pub api_token: Option<String>,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    /// Bound on one remote write during a sync cycle
    pub item_timeout: Duration,
}

impl std::fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("api_url", &self.api_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("probe_interval", &self.probe_interval)
            .field("probe_timeout", &self.probe_timeout)
            .field("item_timeout", &self.item_timeout)
            .finish()
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_url: None,
            api_token: None,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            item_timeout: DEFAULT_SYNC_ITEM_TIMEOUT,
        }
    }
}

impl SyncSettings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup`, which returns a variable's raw value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = normalize_text_option(lookup(ENV_API_URL))
            .map(|url| {
                if is_http_url(&url) {
                    Ok(url.trim_end_matches('/').to_string())
                } else {
                    Err(Error::InvalidInput(format!(
                        "{ENV_API_URL} must include http:// or https:// (got '{}')",
                        compact_text(&url)
                    )))
                }
            })
            .transpose()?;

        Ok(Self {
            api_url,
            api_token: normalize_text_option(lookup(ENV_API_TOKEN)),
            probe_interval: parse_secs(&lookup, ENV_PROBE_INTERVAL_SECS, defaults.probe_interval)?,
            probe_timeout: parse_secs(&lookup, ENV_PROBE_TIMEOUT_SECS, defaults.probe_timeout)?,
            item_timeout: parse_secs(&lookup, ENV_SYNC_ITEM_TIMEOUT_SECS, defaults.item_timeout)?,
        })
    }

    /// Whether a remote store is configured at all
    pub const fn is_configured(&self) -> bool {
        self.api_url.is_some()
    }
}

fn parse_secs<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = normalize_text_option(lookup(key)) else {
        return Ok(default);
    };

    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(Error::InvalidInput(format!(
            "{key} must be a positive number of seconds (got '{}')",
            compact_text(&raw)
        ))),
    }
}
