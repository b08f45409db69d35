//! Equipment model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::record::{EntityData, EntityId, EntityKind, IndexField, Record};
use crate::error::{Error, Result};

/// Kind of instrument under calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EquipmentType {
    LoadCell,
    SpeedDisplacement,
}

impl EquipmentType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoadCell => "load-cell",
            Self::SpeedDisplacement => "speed-displacement",
        }
    }
}

impl fmt::Display for EquipmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EquipmentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "load-cell" => Ok(Self::LoadCell),
            "speed-displacement" => Ok(Self::SpeedDisplacement),
            other => Err(Error::InvalidInput(format!("unknown equipment type: {other}"))),
        }
    }
}

/// Nameplate specification of a piece of equipment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specifications {
    pub capacity: Option<String>,
    pub accuracy: Option<String>,
    pub range: Option<String>,
    pub units: Option<String>,
}

/// Customer equipment that gets calibrated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentData {
    pub name: String,
    #[serde(rename = "type")]
    pub equipment_type: EquipmentType,
    pub serial_number: Option<String>,
    /// Owning customer (soft reference, may dangle)
    pub customer_id: EntityId,
    #[serde(default)]
    pub specifications: Specifications,
}

/// A stored piece of equipment
pub type Equipment = Record<EquipmentData>;

impl EquipmentData {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        equipment_type: EquipmentType,
        customer_id: EntityId,
    ) -> Self {
        Self {
            name: name.into(),
            equipment_type,
            serial_number: None,
            customer_id,
            specifications: Specifications::default(),
        }
    }
}

/// Equipment lookup indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipmentIndex {
    CustomerId,
    Type,
    SerialNumber,
}

impl IndexField for EquipmentIndex {
    fn json_path(self) -> &'static str {
        match self {
            Self::CustomerId => "$.customerId",
            Self::Type => "$.type",
            Self::SerialNumber => "$.serialNumber",
        }
    }
}

impl EntityData for EquipmentData {
    const KIND: EntityKind = EntityKind::Equipment;
    type Index = EquipmentIndex;

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "equipment name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equipment_type_uses_kebab_case() {
        let json = serde_json::to_string(&EquipmentType::SpeedDisplacement).unwrap();
        assert_eq!(json, "\"speed-displacement\"");
        assert_eq!(
            "load-cell".parse::<EquipmentType>().unwrap(),
            EquipmentType::LoadCell
        );
        assert!("scale".parse::<EquipmentType>().is_err());
    }

    #[test]
    fn type_field_is_serialized_as_type() {
        let data = EquipmentData::new("Press", EquipmentType::LoadCell, EntityId::new());
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["type"], "load-cell");
        assert!(value["specifications"].is_object());
    }
}
