//! Reference tool model (the standards used to calibrate customer equipment)

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::record::{EntityData, EntityKind, IndexField, Record};
use crate::error::{Error, Result};

/// Days before the next calibration date at which a tool counts as due soon.
pub const DUE_SOON_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCategory {
    LoadTool,
    DisplacementTool,
}

impl ToolCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoadTool => "load-tool",
            Self::DisplacementTool => "displacement-tool",
        }
    }
}

impl FromStr for ToolCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "load-tool" => Ok(Self::LoadTool),
            "displacement-tool" => Ok(Self::DisplacementTool),
            other => Err(Error::InvalidInput(format!("unknown tool category: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolStatus {
    #[default]
    Active,
    DueSoon,
    Overdue,
    OutOfService,
}

impl ToolStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::DueSoon => "due-soon",
            Self::Overdue => "overdue",
            Self::OutOfService => "out-of-service",
        }
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "due-soon" => Ok(Self::DueSoon),
            "overdue" => Ok(Self::Overdue),
            "out-of-service" => Ok(Self::OutOfService),
            other => Err(Error::InvalidInput(format!("unknown tool status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolData {
    pub name: String,
    pub category: ToolCategory,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub accuracy: Option<String>,
    pub range: Option<String>,
    pub last_calibration_date: Option<NaiveDate>,
    pub next_calibration_date: Option<NaiveDate>,
    pub certificate_number: Option<String>,
    #[serde(default)]
    pub status: ToolStatus,
    pub notes: Option<String>,
}

/// A stored tool
pub type Tool = Record<ToolData>;

impl ToolData {
    #[must_use]
    pub fn new(name: impl Into<String>, category: ToolCategory) -> Self {
        Self {
            name: name.into(),
            category,
            serial_number: None,
            manufacturer: None,
            model: None,
            accuracy: None,
            range: None,
            last_calibration_date: None,
            next_calibration_date: None,
            certificate_number: None,
            status: ToolStatus::Active,
            notes: None,
        }
    }

    /// Status implied by the next calibration date as of `today`.
    ///
    /// `OutOfService` is set by a technician and is never derived away.
    pub fn derived_status(&self, today: NaiveDate) -> ToolStatus {
        if self.status == ToolStatus::OutOfService {
            return ToolStatus::OutOfService;
        }
        let Some(next) = self.next_calibration_date else {
            return ToolStatus::Active;
        };
        let days_left = (next - today).num_days();
        if days_left < 0 {
            ToolStatus::Overdue
        } else if days_left <= DUE_SOON_WINDOW_DAYS {
            ToolStatus::DueSoon
        } else {
            ToolStatus::Active
        }
    }
}

/// Tool lookup indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolIndex {
    Category,
    Status,
    SerialNumber,
}

impl IndexField for ToolIndex {
    fn json_path(self) -> &'static str {
        match self {
            Self::Category => "$.category",
            Self::Status => "$.status",
            Self::SerialNumber => "$.serialNumber",
        }
    }
}

impl EntityData for ToolData {
    const KIND: EntityKind = EntityKind::Tool;
    type Index = ToolIndex;

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("tool name must not be empty".into()));
        }
        if let (Some(last), Some(next)) = (self.last_calibration_date, self.next_calibration_date)
        {
            if next < last {
                return Err(Error::InvalidInput(
                    "next calibration date precedes the last calibration date".into(),
                ));
            }
        }
        Ok(())
    }
}
