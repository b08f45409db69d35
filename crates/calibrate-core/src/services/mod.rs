//! Service objects shared across clients.

mod calibration;
mod local_store;

pub use calibration::{BackgroundTasks, CalibrationService, ServiceOptions};
pub use local_store::{LocalStore, StorageLocation, StorageMode, UpdateMode, UpdateModes};
