//! Calibrate CLI - record calibrations from the terminal
//!
//! Works fully offline against the local store; pending changes are pushed to
//! the remote store whenever it is reachable.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{
    CalibrationCommands, Cli, Commands, CustomerCommands, EquipmentCommands, ToolCommands,
};
use crate::commands::calibration::{
    run_calibration_add, run_calibration_delete, run_calibration_list, run_calibration_show,
    NewCalibration,
};
use crate::commands::common::CliContext;
use crate::commands::customer::{
    run_customer_add, run_customer_delete, run_customer_list, run_customer_show,
};
use crate::commands::equipment::{
    run_equipment_add, run_equipment_delete, run_equipment_list, run_equipment_show,
};
use crate::commands::queue::run_queue;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::tool::{run_tool_add, run_tool_delete, run_tool_list, run_tool_show};
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    // Only load .env in development; production uses the real environment.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = CliContext::from_env(cli.db_path)?;

    match cli.command {
        Commands::Customer { command } => match command {
            CustomerCommands::Add {
                name,
                location,
                contact_name,
                email,
                phone,
                notes,
            } => {
                let mut data = calibrate_core::CustomerData::new(name);
                data.location = location;
                data.contact_name = contact_name;
                data.email = email;
                data.phone = phone;
                data.notes = notes;
                run_customer_add(&ctx, data).await
            }
            CustomerCommands::List { name, json } => {
                run_customer_list(&ctx, name.as_deref(), json).await
            }
            CustomerCommands::Show(args) => run_customer_show(&ctx, &args.id, args.json).await,
            CustomerCommands::Delete { id } => run_customer_delete(&ctx, &id).await,
        },
        Commands::Equipment { command } => match command {
            EquipmentCommands::Add {
                name,
                equipment_type,
                customer,
                serial_number,
                capacity,
                accuracy,
                range,
                units,
            } => {
                run_equipment_add(
                    &ctx,
                    name,
                    equipment_type.into(),
                    &customer,
                    serial_number,
                    calibrate_core::models::Specifications {
                        capacity,
                        accuracy,
                        range,
                        units,
                    },
                )
                .await
            }
            EquipmentCommands::List { customer, json } => {
                run_equipment_list(&ctx, customer.as_deref(), json).await
            }
            EquipmentCommands::Show(args) => run_equipment_show(&ctx, &args.id, args.json).await,
            EquipmentCommands::Delete { id } => run_equipment_delete(&ctx, &id).await,
        },
        Commands::Tool { command } => match command {
            ToolCommands::Add {
                name,
                category,
                serial_number,
                manufacturer,
                model,
                accuracy,
                range,
                last_calibrated,
                next_due,
                certificate_number,
                out_of_service,
                notes,
            } => {
                let mut data = calibrate_core::ToolData::new(name, category.into());
                data.serial_number = serial_number;
                data.manufacturer = manufacturer;
                data.model = model;
                data.accuracy = accuracy;
                data.range = range;
                data.last_calibration_date = last_calibrated;
                data.next_calibration_date = next_due;
                data.certificate_number = certificate_number;
                data.notes = notes;
                if out_of_service {
                    data.status = calibrate_core::models::ToolStatus::OutOfService;
                }
                run_tool_add(&ctx, data).await
            }
            ToolCommands::List {
                category,
                status,
                json,
            } => run_tool_list(&ctx, category.map(Into::into), status.map(Into::into), json).await,
            ToolCommands::Show(args) => run_tool_show(&ctx, &args.id, args.json).await,
            ToolCommands::Delete { id } => run_tool_delete(&ctx, &id).await,
        },
        Commands::Calibration { command } => match command {
            CalibrationCommands::Add {
                equipment,
                technician,
                date,
                temperature,
                humidity,
                tools,
                result,
                results_file,
            } => {
                let request = NewCalibration {
                    equipment,
                    technician,
                    date,
                    temperature,
                    humidity,
                    tools,
                    result: result.into(),
                    results_file,
                };
                run_calibration_add(&ctx, request).await
            }
            CalibrationCommands::List {
                equipment,
                customer,
                json,
            } => {
                run_calibration_list(&ctx, equipment.as_deref(), customer.as_deref(), json).await
            }
            CalibrationCommands::Show(args) => {
                run_calibration_show(&ctx, &args.id, args.json).await
            }
            CalibrationCommands::Delete { id } => run_calibration_delete(&ctx, &id).await,
        },
        Commands::Queue { json } => run_queue(&ctx, json).await,
        Commands::Status { json } => run_status(&ctx, json).await,
        Commands::Sync => run_sync(&ctx).await,
        Commands::Watch => run_watch(&ctx).await,
    }
}
