use std::path::{Path, PathBuf};

use calibrate_core::models::{CalibrationIndex, CalibrationResults, OverallResult};
use calibrate_core::{Calibration, CalibrationData, EntityId, EntityKind};
use chrono::{NaiveDate, Utc};

use crate::commands::common::{not_found, parse_id, print_json, sync_marker, truncate, CliContext};
use crate::error::CliError;

/// Arguments of `calibration add`
#[derive(Debug, Clone)]
pub struct NewCalibration {
    pub equipment: String,
    pub technician: String,
    pub date: Option<NaiveDate>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub tools: Vec<String>,
    pub result: OverallResult,
    pub results_file: Option<PathBuf>,
}

pub async fn run_calibration_add(ctx: &CliContext, request: NewCalibration) -> Result<(), CliError> {
    let equipment_id = parse_id(EntityKind::Equipment, &request.equipment)?;
    let tool_ids = request
        .tools
        .iter()
        .map(|id| parse_id(EntityKind::Tool, id))
        .collect::<Result<Vec<EntityId>, CliError>>()?;

    let service = ctx.open_service().await?;
    let equipment = service
        .get_equipment_by_id(&equipment_id)
        .await?
        .ok_or_else(|| not_found(EntityKind::Equipment, &equipment_id))?;
    let calibration_type = equipment.data.equipment_type;

    let results = match &request.results_file {
        Some(path) => read_results(path)?,
        None => CalibrationResults::empty(calibration_type),
    };

    let calibration = service
        .add_calibration(CalibrationData {
            customer_id: equipment.data.customer_id.clone(),
            equipment_id,
            calibration_type,
            technician: request.technician,
            calibration_date: request.date.unwrap_or_else(|| Utc::now().date_naive()),
            temperature: request.temperature,
            humidity: request.humidity,
            tool_ids,
            results,
            overall_result: request.result,
        })
        .await?;
    println!("{}", calibration.id);
    Ok(())
}

pub async fn run_calibration_list(
    ctx: &CliContext,
    equipment: Option<&str>,
    customer: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let service = ctx.open_service().await?;
    let calibrations = match (equipment, customer) {
        (Some(equipment), _) => {
            let id = parse_id(EntityKind::Equipment, equipment)?;
            service
                .get_calibrations_by_index(CalibrationIndex::EquipmentId, id.as_str())
                .await?
        }
        (None, Some(customer)) => {
            let id = parse_id(EntityKind::Customer, customer)?;
            service
                .get_calibrations_by_index(CalibrationIndex::CustomerId, id.as_str())
                .await?
        }
        (None, None) => service.get_all_calibrations().await?,
    };

    if as_json {
        return print_json(&calibrations);
    }
    if calibrations.is_empty() {
        println!("No calibrations recorded.");
    }
    for line in format_calibration_lines(&calibrations) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_calibration_show(
    ctx: &CliContext,
    id: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let id = parse_id(EntityKind::Calibration, id)?;
    let service = ctx.open_service().await?;
    let calibration = service
        .get_calibration_by_id(&id)
        .await?
        .ok_or_else(|| not_found(EntityKind::Calibration, &id))?;

    if as_json {
        return print_json(&calibration);
    }

    let data = &calibration.data;
    let equipment = service
        .get_equipment_by_id(&data.equipment_id)
        .await?
        .map_or_else(
            || format!("{} (missing)", data.equipment_id),
            |equipment| format!("{} ({})", equipment.data.name, equipment.id),
        );

    println!("ID:          {}", calibration.id);
    println!("Date:        {}", data.calibration_date);
    println!("Type:        {}", data.calibration_type);
    println!("Equipment:   {equipment}");
    println!("Technician:  {}", data.technician);
    if let Some(temperature) = data.temperature {
        println!("Temperature: {temperature}");
    }
    if let Some(humidity) = data.humidity {
        println!("Humidity:    {humidity}");
    }
    if !data.tool_ids.is_empty() {
        let tools = data
            .tool_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        println!("Tools:       {tools}");
    }
    println!("Readings:    {}", summarize_results(&data.results));
    println!("Result:      {}", data.overall_result.as_str());
    println!("Synced:      {}", if calibration.dirty { "no" } else { "yes" });
    Ok(())
}

pub async fn run_calibration_delete(ctx: &CliContext, id: &str) -> Result<(), CliError> {
    let id = parse_id(EntityKind::Calibration, id)?;
    let service = ctx.open_service().await?;
    service.delete_calibration(&id).await?;
    println!("{id}");
    Ok(())
}

pub fn read_results(path: &Path) -> Result<CalibrationResults, CliError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|error| CliError::InvalidResults(format!("{}: {error}", path.display())))
}

pub fn summarize_results(results: &CalibrationResults) -> String {
    match results {
        CalibrationResults::LoadCell(load_cell) => {
            let runs = load_cell
                .points
                .iter()
                .map(|point| point.run_readings.len())
                .max()
                .unwrap_or(0);
            format!("{} load points, {runs} runs", load_cell.points.len())
        }
        CalibrationResults::SpeedDisplacement(readings) => format!(
            "{} speed points, {} displacement points",
            readings.speed.len(),
            readings.displacement.len()
        ),
    }
}

pub fn format_calibration_lines(calibrations: &[Calibration]) -> Vec<String> {
    calibrations
        .iter()
        .map(|calibration| {
            let data = &calibration.data;
            format!(
                "{} {}  {}  {:<18}  {:<20}  {}",
                sync_marker(calibration.dirty),
                calibration.id,
                data.calibration_date,
                data.calibration_type.as_str(),
                truncate(&data.technician, 20),
                data.overall_result.as_str()
            )
        })
        .collect()
}
