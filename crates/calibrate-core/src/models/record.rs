//! Record envelope shared by every stored entity

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::now_micros;

/// Identifier of a stored entity.
///
/// Generated client-side as a UUID v7 (time-sortable). Identifiers are the
/// join key with the remote store and never change once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create a new unique identifier using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("entity id must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// The entity tables kept by the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Customer,
    Equipment,
    Tool,
    Calibration,
}

impl EntityKind {
    /// Every kind, in the order reconciliation visits them.
    pub const ALL: [Self; 4] = [Self::Customer, Self::Equipment, Self::Tool, Self::Calibration];

    /// Stable singular name, used in the mutation queue.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Equipment => "equipment",
            Self::Tool => "tool",
            Self::Calibration => "calibration",
        }
    }

    /// Table name, shared by the local schema and the remote record API.
    pub const fn table(self) -> &'static str {
        match self {
            Self::Customer => "customers",
            Self::Equipment => "equipment",
            Self::Tool => "tools",
            Self::Calibration => "calibrations",
        }
    }

    /// Resolve a kind from its table name.
    pub fn from_table(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.table() == table)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown entity kind: {s}")))
    }
}

/// A secondary index on an entity table.
pub trait IndexField: Copy + fmt::Debug + Send + Sync + 'static {
    /// JSON path of the indexed field inside the stored document.
    fn json_path(self) -> &'static str;
}

/// Typed payload of one entity table.
pub trait EntityData:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    /// Table this payload is stored in
    const KIND: EntityKind;

    /// Secondary indexes available for lookups
    type Index: IndexField;

    /// Reject payloads that must never be stored.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// A stored entity: record metadata plus the typed entity payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record<T> {
    /// Unique identifier
    pub id: EntityId,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last local modification timestamp, also the record version
    pub updated_at: DateTime<Utc>,
    /// Has local changes not yet confirmed by the remote store
    #[serde(default)]
    pub dirty: bool,
    /// Entity payload
    #[serde(flatten)]
    pub data: T,
}

impl<T: EntityData> Record<T> {
    /// Wrap a payload in a fresh record (new id, current timestamps, dirty).
    #[must_use]
    pub fn new(data: T) -> Self {
        let now = now_micros();
        Self {
            id: EntityId::new(),
            created_at: now,
            updated_at: now,
            dirty: true,
            data,
        }
    }

    /// Wrap a payload under a caller-chosen id.
    #[must_use]
    pub fn with_id(id: EntityId, data: T) -> Self {
        Self {
            id,
            ..Self::new(data)
        }
    }

    /// Table this record belongs to
    pub const fn kind(&self) -> EntityKind {
        T::KIND
    }
}
