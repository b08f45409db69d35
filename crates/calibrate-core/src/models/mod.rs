//! Data models for Calibrate

mod calibration;
mod customer;
mod equipment;
mod record;
mod tool;

pub use calibration::{
    Calibration, CalibrationData, CalibrationIndex, CalibrationResults, DisplacementPoint,
    LoadCellPoint, LoadCellResults, OverallResult, SpeedDisplacementResults, SpeedPoint,
};
pub use customer::{Customer, CustomerData, CustomerIndex};
pub use equipment::{Equipment, EquipmentData, EquipmentIndex, EquipmentType, Specifications};
pub use record::{EntityData, EntityId, EntityKind, IndexField, Record};
pub use tool::{Tool, ToolCategory, ToolData, ToolIndex, ToolStatus, DUE_SOON_WINDOW_DAYS};
