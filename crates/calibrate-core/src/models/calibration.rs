//! Calibration model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::equipment::EquipmentType;
use super::record::{EntityData, EntityId, EntityKind, IndexField, Record};
use crate::error::{Error, Result};

/// Overall verdict of a calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallResult {
    Pass,
    Fail,
}

impl OverallResult {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }
}

/// One applied load with the indicator readings of each run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadCellPoint {
    pub applied_load: f64,
    pub run_readings: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadCellResults {
    pub units: Option<String>,
    pub points: Vec<LoadCellPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedPoint {
    pub set_speed: f64,
    pub measured_speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplacementPoint {
    pub set_displacement: f64,
    pub measured_displacement: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedDisplacementResults {
    pub speed: Vec<SpeedPoint>,
    pub displacement: Vec<DisplacementPoint>,
}

/// Measurement payload, keyed by calibration type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum CalibrationResults {
    LoadCell(LoadCellResults),
    SpeedDisplacement(SpeedDisplacementResults),
}

impl CalibrationResults {
    /// Every numeric reading in the payload
    fn readings(&self) -> Vec<f64> {
        match self {
            Self::LoadCell(load_cell) => load_cell
                .points
                .iter()
                .flat_map(|point| {
                    std::iter::once(point.applied_load).chain(point.run_readings.iter().copied())
                })
                .collect(),
            Self::SpeedDisplacement(readings) => readings
                .speed
                .iter()
                .flat_map(|point| [point.set_speed, point.measured_speed])
                .chain(readings.displacement.iter().flat_map(|point| {
                    [point.set_displacement, point.measured_displacement]
                }))
                .collect(),
        }
    }

    /// Calibration type this payload belongs to
    pub const fn calibration_type(&self) -> EquipmentType {
        match self {
            Self::LoadCell(_) => EquipmentType::LoadCell,
            Self::SpeedDisplacement(_) => EquipmentType::SpeedDisplacement,
        }
    }

    /// Empty payload for the given calibration type
    pub fn empty(calibration_type: EquipmentType) -> Self {
        match calibration_type {
            EquipmentType::LoadCell => Self::LoadCell(LoadCellResults::default()),
            EquipmentType::SpeedDisplacement => {
                Self::SpeedDisplacement(SpeedDisplacementResults::default())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationData {
    /// Owning customer (soft reference)
    pub customer_id: EntityId,
    /// Calibrated equipment (soft reference)
    pub equipment_id: EntityId,
    #[serde(rename = "type")]
    pub calibration_type: EquipmentType,
    pub technician: String,
    pub calibration_date: NaiveDate,
    /// Ambient temperature during the calibration
    pub temperature: Option<f64>,
    /// Relative humidity during the calibration
    pub humidity: Option<f64>,
    /// Reference tools used
    #[serde(default)]
    pub tool_ids: Vec<EntityId>,
    pub results: CalibrationResults,
    pub overall_result: OverallResult,
}

/// A stored calibration
pub type Calibration = Record<CalibrationData>;

/// Calibration lookup indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationIndex {
    CustomerId,
    EquipmentId,
    Type,
}

impl IndexField for CalibrationIndex {
    fn json_path(self) -> &'static str {
        match self {
            Self::CustomerId => "$.customerId",
            Self::EquipmentId => "$.equipmentId",
            Self::Type => "$.type",
        }
    }
}

impl EntityData for CalibrationData {
    const KIND: EntityKind = EntityKind::Calibration;
    type Index = CalibrationIndex;

    fn validate(&self) -> Result<()> {
        let results_type = self.results.calibration_type();
        if results_type != self.calibration_type {
            return Err(Error::InvalidInput(format!(
                "{results_type} results cannot be stored on a {} calibration",
                self.calibration_type
            )));
        }
        if self.technician.trim().is_empty() {
            return Err(Error::InvalidInput("technician must not be empty".into()));
        }
        // JSON has no encoding for NaN or infinity; they would come back as null.
        for (field, value) in [("temperature", self.temperature), ("humidity", self.humidity)] {
            if value.is_some_and(|value| !value.is_finite()) {
                return Err(Error::InvalidInput(format!("{field} must be a finite number")));
            }
        }
        if self.results.readings().iter().any(|value| !value.is_finite()) {
            return Err(Error::InvalidInput(
                "calibration readings must be finite numbers".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(results: CalibrationResults) -> CalibrationData {
        CalibrationData {
            customer_id: EntityId::new(),
            equipment_id: EntityId::new(),
            calibration_type: EquipmentType::LoadCell,
            technician: "R. Diaz".to_string(),
            calibration_date: "2024-03-14".parse().unwrap(),
            temperature: Some(21.5),
            humidity: Some(40.0),
            tool_ids: vec![],
            results,
            overall_result: OverallResult::Pass,
        }
    }

    #[test]
    fn results_type_must_match_calibration_type() {
        let matching = sample(CalibrationResults::empty(EquipmentType::LoadCell));
        assert!(matching.validate().is_ok());

        let mismatched = sample(CalibrationResults::empty(EquipmentType::SpeedDisplacement));
        assert!(matches!(mismatched.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut ambient = sample(CalibrationResults::empty(EquipmentType::LoadCell));
        ambient.humidity = Some(f64::INFINITY);
        assert!(matches!(ambient.validate(), Err(Error::InvalidInput(_))));

        let load_cell = sample(CalibrationResults::LoadCell(LoadCellResults {
            units: None,
            points: vec![LoadCellPoint {
                applied_load: 5.0,
                run_readings: vec![5.01, f64::NAN],
            }],
        }));
        assert!(matches!(load_cell.validate(), Err(Error::InvalidInput(_))));

        let mut speed = sample(CalibrationResults::SpeedDisplacement(
            SpeedDisplacementResults {
                speed: vec![],
                displacement: vec![DisplacementPoint {
                    set_displacement: 1.0,
                    measured_displacement: f64::NEG_INFINITY,
                }],
            },
        ));
        speed.calibration_type = EquipmentType::SpeedDisplacement;
        assert!(matches!(speed.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn results_are_tagged_by_kind() {
        let results = CalibrationResults::LoadCell(LoadCellResults {
            units: Some("kN".to_string()),
            points: vec![LoadCellPoint {
                applied_load: 10.0,
                run_readings: vec![10.01, 9.99],
            }],
        });
        let value = serde_json::to_value(&results).unwrap();
        assert_eq!(value["kind"], "load-cell");
        assert_eq!(value["data"]["points"][0]["appliedLoad"], 10.0);

        let parsed: CalibrationResults = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, results);
    }
}
