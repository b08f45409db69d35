//! Remote system-of-record client.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::error::{Error, Result};
use crate::models::{EntityId, EntityKind};
use crate::queue::Operation;
use crate::util::{is_http_url, normalize_text_option};

/// Prefix of the record endpoints
pub const RECORDS_PATH: &str = "/v1/records";

/// One write sent to the remote store
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteWrite {
    pub operation: Operation,
    pub kind: EntityKind,
    pub id: EntityId,
    /// Full record document; `None` for deletes
    pub payload: Option<serde_json::Value>,
}

impl RemoteWrite {
    /// Create or update the remote copy of a record
    pub const fn upsert(
        operation: Operation,
        kind: EntityKind,
        id: EntityId,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            operation,
            kind,
            id,
            payload: Some(payload),
        }
    }

    /// Remove the remote copy of a record
    pub const fn delete(kind: EntityKind, id: EntityId) -> Self {
        Self {
            operation: Operation::Delete,
            kind,
            id,
            payload: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote rejected write: {message}")]
    Rejected { status: u16, message: String },
    #[error("remote request failed: {0}")]
    Network(String),
    #[error("remote request timed out after {0:?}")]
    Timeout(Duration),
    #[error("remote credentials missing or refused")]
    Unauthenticated,
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<RemoteError> for Error {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::Rejected { .. } | RemoteError::Unauthenticated => {
                Self::RemoteRejected(error.to_string())
            }
            RemoteError::Network(_) | RemoteError::Timeout(_) => {
                Self::NetworkUnavailable(error.to_string())
            }
        }
    }
}

/// Remote system of record the sync engine pushes to.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Whether a sync attempt can authenticate at all
    fn has_credentials(&self) -> bool;

    /// Apply one write. Deletes of unknown records succeed.
    async fn apply(&self, write: &RemoteWrite) -> std::result::Result<(), RemoteError>;
}

/// Remote store for local-only operation; sync cycles exit immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRemote;

#[async_trait]
impl RemoteStore for DisabledRemote {
    fn has_credentials(&self) -> bool {
        false
    }

    async fn apply(&self, _write: &RemoteWrite) -> std::result::Result<(), RemoteError> {
        Err(RemoteError::Unauthenticated)
    }
}

/// HTTP client for the `calibrate-api` record endpoints
pub struct HttpRemoteStore {
    base_url: String,
    token: RwLock<Option<String>>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteStore")
            .field("base_url", &self.base_url)
            .field("token", &self.has_credentials().then_some("[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|error| Error::InvalidInput(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            base_url,
            token: RwLock::new(normalize_text_option(token)),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the bearer token; `None` or blank disables sync.
    pub fn set_auth_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) =
            normalize_text_option(token);
    }

    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record_url(&self, kind: EntityKind, id: &EntityId) -> String {
        format!(
            "{}{RECORDS_PATH}/{}/{}",
            self.base_url,
            kind.table(),
            urlencoding::encode(id.as_str())
        )
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    fn has_credentials(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    async fn apply(&self, write: &RemoteWrite) -> std::result::Result<(), RemoteError> {
        let token = self.token().ok_or(RemoteError::Unauthenticated)?;
        let url = self.record_url(write.kind, &write.id);

        let request = match (&write.operation, &write.payload) {
            (Operation::Delete, _) => self.client.delete(&url),
            (_, Some(payload)) => self.client.put(&url).json(payload),
            (_, None) => {
                return Err(RemoteError::Rejected {
                    status: 0,
                    message: format!("{} {} has no payload", write.kind, write.id),
                });
            }
        };

        let response = request
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if write.operation == Operation::Delete && status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RemoteError::Unauthenticated);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Rejected {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

pub(crate) fn normalize_base_url(raw: &str) -> Result<String> {
    let base_url = normalize_text_option(Some(raw.to_string()))
        .ok_or_else(|| Error::InvalidInput("API URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "API URL must include http:// or https://".to_string(),
        ))
    }
}
