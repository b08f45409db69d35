//! Customer model

use serde::{Deserialize, Serialize};

use super::record::{EntityData, EntityKind, IndexField, Record};
use crate::error::{Error, Result};

/// A customer owning equipment and calibrations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerData {
    /// Display name
    pub name: String,
    /// Postal location
    pub location: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
}

/// A stored customer
pub type Customer = Record<CustomerData>;

impl CustomerData {
    /// Create a customer payload with only a name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Customer lookup indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerIndex {
    Name,
}

impl IndexField for CustomerIndex {
    fn json_path(self) -> &'static str {
        match self {
            Self::Name => "$.name",
        }
    }
}

impl EntityData for CustomerData {
    const KIND: EntityKind = EntityKind::Customer;
    type Index = CustomerIndex;

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("customer name must not be empty".into()));
        }
        Ok(())
    }
}
