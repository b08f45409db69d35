pub mod calibration;
pub mod common;
pub mod customer;
pub mod equipment;
pub mod queue;
pub mod status;
pub mod sync;
pub mod tool;
pub mod watch;
