use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use calibrate_core::models::{EquipmentType, OverallResult, ToolCategory, ToolStatus};

#[derive(Parser)]
#[command(name = "calibrate")]
#[command(about = "Record equipment calibrations offline and sync them when online")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage customers
    Customer {
        #[command(subcommand)]
        command: CustomerCommands,
    },
    /// Manage customer equipment
    Equipment {
        #[command(subcommand)]
        command: EquipmentCommands,
    },
    /// Manage reference tools
    Tool {
        #[command(subcommand)]
        command: ToolCommands,
    },
    /// Record and review calibrations
    Calibration {
        #[command(subcommand)]
        command: CalibrationCommands,
    },
    /// Show mutations waiting to be synced
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show connectivity and sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push pending changes to the remote store now
    Sync,
    /// Stay running, syncing whenever the remote store is reachable
    Watch,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum EquipmentTypeArg {
    LoadCell,
    SpeedDisplacement,
}

impl From<EquipmentTypeArg> for EquipmentType {
    fn from(value: EquipmentTypeArg) -> Self {
        match value {
            EquipmentTypeArg::LoadCell => Self::LoadCell,
            EquipmentTypeArg::SpeedDisplacement => Self::SpeedDisplacement,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ToolCategoryArg {
    LoadTool,
    DisplacementTool,
}

impl From<ToolCategoryArg> for ToolCategory {
    fn from(value: ToolCategoryArg) -> Self {
        match value {
            ToolCategoryArg::LoadTool => Self::LoadTool,
            ToolCategoryArg::DisplacementTool => Self::DisplacementTool,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ToolStatusArg {
    Active,
    DueSoon,
    Overdue,
    OutOfService,
}

impl From<ToolStatusArg> for ToolStatus {
    fn from(value: ToolStatusArg) -> Self {
        match value {
            ToolStatusArg::Active => Self::Active,
            ToolStatusArg::DueSoon => Self::DueSoon,
            ToolStatusArg::Overdue => Self::Overdue,
            ToolStatusArg::OutOfService => Self::OutOfService,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OverallResultArg {
    Pass,
    Fail,
}

impl From<OverallResultArg> for OverallResult {
    fn from(value: OverallResultArg) -> Self {
        match value {
            OverallResultArg::Pass => Self::Pass,
            OverallResultArg::Fail => Self::Fail,
        }
    }
}

/// Options shared by every `show` subcommand
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Record ID
    pub id: String,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Create a customer
    Add {
        /// Customer name
        name: String,
        /// Postal location
        #[arg(long)]
        location: Option<String>,
        /// Contact person
        #[arg(long)]
        contact_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List customers
    List {
        /// Only customers with this exact name
        #[arg(long)]
        name: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one customer
    Show(ShowArgs),
    /// Delete a customer
    Delete {
        /// Customer ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum EquipmentCommands {
    /// Register a piece of customer equipment
    Add {
        /// Equipment name
        name: String,
        /// Equipment type
        #[arg(long = "type", value_enum)]
        equipment_type: EquipmentTypeArg,
        /// Owning customer ID
        #[arg(long, value_name = "ID")]
        customer: String,
        #[arg(long)]
        serial_number: Option<String>,
        #[arg(long)]
        capacity: Option<String>,
        #[arg(long)]
        accuracy: Option<String>,
        #[arg(long)]
        range: Option<String>,
        #[arg(long)]
        units: Option<String>,
    },
    /// List equipment
    List {
        /// Only equipment owned by this customer ID
        #[arg(long, value_name = "ID")]
        customer: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one equipment record
    Show(ShowArgs),
    /// Delete an equipment record
    Delete {
        /// Equipment ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ToolCommands {
    /// Register a reference tool
    Add {
        /// Tool name
        name: String,
        /// Tool category
        #[arg(long, value_enum)]
        category: ToolCategoryArg,
        #[arg(long)]
        serial_number: Option<String>,
        #[arg(long)]
        manufacturer: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        accuracy: Option<String>,
        #[arg(long)]
        range: Option<String>,
        /// Date of the tool's last calibration (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        last_calibrated: Option<NaiveDate>,
        /// Date the tool's next calibration is due (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        next_due: Option<NaiveDate>,
        #[arg(long)]
        certificate_number: Option<String>,
        /// Mark the tool as out of service
        #[arg(long)]
        out_of_service: bool,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List tools with their calibration status as of today
    List {
        #[arg(long, value_enum)]
        category: Option<ToolCategoryArg>,
        /// Only tools whose status as of today matches
        #[arg(long, value_enum)]
        status: Option<ToolStatusArg>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one tool
    Show(ShowArgs),
    /// Delete a tool
    Delete {
        /// Tool ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum CalibrationCommands {
    /// Record a calibration of a piece of equipment
    Add {
        /// Calibrated equipment ID
        #[arg(long, value_name = "ID")]
        equipment: String,
        /// Technician performing the calibration
        #[arg(long)]
        technician: String,
        /// Calibration date (YYYY-MM-DD, defaults to today)
        #[arg(long, value_name = "DATE")]
        date: Option<NaiveDate>,
        /// Ambient temperature
        #[arg(long)]
        temperature: Option<f64>,
        /// Relative humidity
        #[arg(long)]
        humidity: Option<f64>,
        /// Reference tool ID (repeatable)
        #[arg(long = "tool", value_name = "ID")]
        tools: Vec<String>,
        /// Overall verdict
        #[arg(long, value_enum)]
        result: OverallResultArg,
        /// JSON file holding the typed readings
        #[arg(long, value_name = "PATH")]
        results_file: Option<PathBuf>,
    },
    /// List calibrations
    List {
        /// Only calibrations of this equipment ID
        #[arg(long, value_name = "ID")]
        equipment: Option<String>,
        /// Only calibrations for this customer ID
        #[arg(long, value_name = "ID", conflicts_with = "equipment")]
        customer: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one calibration
    Show(ShowArgs),
    /// Delete a calibration
    Delete {
        /// Calibration ID
        id: String,
    },
}
