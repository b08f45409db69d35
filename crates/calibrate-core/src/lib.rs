//! calibrate-core - Core library for Calibrate
//!
//! This crate contains the offline persistence and synchronization layer used
//! by every Calibrate interface: the local entity store, the durable mutation
//! queue, the connectivity monitor, the sync engine and the status broadcaster.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod queue;
pub mod services;
pub mod status;
pub mod sync;
pub mod util;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
pub use models::{
    Calibration, CalibrationData, Customer, CustomerData, EntityId, EntityKind, Equipment,
    EquipmentData, Record, Tool, ToolData,
};
pub use services::{CalibrationService, ServiceOptions, StorageLocation, StorageMode};
pub use status::{Connectivity, StatusBroadcaster, Subscription, SyncPhase, SyncStatus};
pub use sync::{SkipReason, SyncOutcome, SyncReport};
