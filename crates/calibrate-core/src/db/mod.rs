//! Database layer for Calibrate

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{RawRecord, RecordRepository};
