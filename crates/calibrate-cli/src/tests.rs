use std::path::PathBuf;

use calibrate_core::config::SyncSettings;
use calibrate_core::models::{
    CalibrationResults, EquipmentType, OverallResult, ToolCategory, ToolStatus,
};
use calibrate_core::queue::Operation;
use calibrate_core::{
    CustomerData, EntityId, EntityKind, EquipmentData, SyncPhase, SyncReport, SyncStatus,
    ToolData,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use clap::Parser;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use crate::cli::{CalibrationCommands, Cli, Commands, EquipmentCommands, EquipmentTypeArg};
use crate::commands::calibration::{
    format_calibration_lines, run_calibration_add, run_calibration_list, summarize_results,
    NewCalibration,
};
use crate::commands::common::{
    format_relative_time, parse_id, resolve_db_path, sync_marker, truncate, CliContext,
};
use crate::commands::customer::{run_customer_add, run_customer_delete, run_customer_show};
use crate::commands::queue::{format_queue_lines, run_queue};
use crate::commands::status::format_status_lines;
use crate::commands::sync::{format_report, run_sync};
use crate::commands::tool::{format_tool_lines, tool_list_items};
use crate::error::CliError;

fn test_context() -> (TempDir, CliContext) {
    let dir = tempfile::tempdir().unwrap();
    let ctx = CliContext {
        db_path: dir.path().join("calibrate.db"),
        settings: SyncSettings::default(),
    };
    (dir, ctx)
}

fn date(raw: &str) -> NaiveDate {
    raw.parse().unwrap()
}

fn calibration_request(equipment: &EntityId) -> NewCalibration {
    NewCalibration {
        equipment: equipment.to_string(),
        technician: "R. Ortiz".to_string(),
        date: Some(date("2024-06-01")),
        temperature: Some(21.5),
        humidity: None,
        tools: Vec::new(),
        result: OverallResult::Pass,
        results_file: None,
    }
}

#[test]
fn cli_parses_equipment_add() {
    let cli = Cli::try_parse_from([
        "calibrate",
        "equipment",
        "add",
        "Press 4",
        "--type",
        "load-cell",
        "--customer",
        "abc",
        "--capacity",
        "50 kN",
    ])
    .unwrap();

    let Commands::Equipment {
        command:
            EquipmentCommands::Add {
                name,
                equipment_type,
                customer,
                capacity,
                ..
            },
    } = cli.command
    else {
        panic!("expected equipment add");
    };
    assert_eq!(name, "Press 4");
    assert_eq!(equipment_type, EquipmentTypeArg::LoadCell);
    assert_eq!(customer, "abc");
    assert_eq!(capacity.as_deref(), Some("50 kN"));
}

#[test]
fn cli_collects_repeated_tool_flags() {
    let cli = Cli::try_parse_from([
        "calibrate",
        "calibration",
        "add",
        "--equipment",
        "eq",
        "--technician",
        "Sam",
        "--tool",
        "t1",
        "--tool",
        "t2",
        "--result",
        "fail",
        "--date",
        "2024-03-04",
    ])
    .unwrap();

    let Commands::Calibration {
        command:
            CalibrationCommands::Add {
                tools, date, result, ..
            },
    } = cli.command
    else {
        panic!("expected calibration add");
    };
    assert_eq!(tools, vec!["t1".to_string(), "t2".to_string()]);
    assert_eq!(date, Some(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()));
    assert_eq!(OverallResult::from(result), OverallResult::Fail);
}

#[test]
fn cli_rejects_conflicting_calibration_filters() {
    let result = Cli::try_parse_from([
        "calibrate",
        "calibration",
        "list",
        "--equipment",
        "a",
        "--customer",
        "b",
    ]);
    assert!(result.is_err());
}

#[test]
fn cli_accepts_global_db_path_after_subcommand() {
    let cli = Cli::try_parse_from(["calibrate", "queue", "--db-path", "/tmp/x.db"]).unwrap();
    assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/x.db")));
}

#[test]
fn resolve_db_path_prefers_cli_argument() {
    let explicit = PathBuf::from("/tmp/explicit.db");
    assert_eq!(resolve_db_path(Some(explicit.clone())), explicit);
}

#[test]
fn parse_id_rejects_blank_input() {
    let error = parse_id(EntityKind::Tool, "   ").unwrap_err();
    assert!(matches!(error, CliError::EmptyId(EntityKind::Tool)));
}

#[test]
fn truncate_collapses_whitespace_and_adds_ellipsis() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a  b\n c", 10), "a b c");
    assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
}

#[test]
fn format_relative_time_units() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    assert_eq!(format_relative_time(&(now - Duration::seconds(30)), &now), "just now");
    assert_eq!(format_relative_time(&(now - Duration::minutes(2)), &now), "2m ago");
    assert_eq!(format_relative_time(&(now - Duration::hours(2)), &now), "2h ago");
    assert_eq!(format_relative_time(&(now - Duration::days(3)), &now), "3d ago");
    assert_eq!(format_relative_time(&(now + Duration::minutes(5)), &now), "just now");
}

#[test]
fn sync_marker_flags_dirty_records() {
    assert_eq!(sync_marker(true), "*");
    assert_eq!(sync_marker(false), " ");
}

#[test]
fn tool_list_filters_on_status_as_of_today() {
    let today = date("2024-06-01");
    let mut due = calibrate_core::Tool::new(ToolData::new("Proving ring", ToolCategory::LoadTool));
    due.data.next_calibration_date = Some(date("2024-06-15"));
    let fine = calibrate_core::Tool::new(ToolData::new("Dial gauge", ToolCategory::DisplacementTool));
    let tools = vec![due, fine];

    let all = tool_list_items(&tools, None, today);
    assert_eq!(all.len(), 2);

    let due_soon = tool_list_items(&tools, Some(ToolStatus::DueSoon), today);
    assert_eq!(due_soon.len(), 1);
    assert_eq!(due_soon[0].tool.data.name, "Proving ring");

    let lines = format_tool_lines(&due_soon);
    assert!(lines[0].contains("due-soon"));
    assert!(lines[0].contains("due 2024-06-15"));
    assert!(lines[0].starts_with('*'));
}

#[test]
fn summarize_results_counts_points() {
    let empty = CalibrationResults::empty(EquipmentType::SpeedDisplacement);
    assert_eq!(
        summarize_results(&empty),
        "0 speed points, 0 displacement points"
    );

    let load_cell: CalibrationResults = serde_json::from_value(serde_json::json!({
        "kind": "load-cell",
        "data": {
            "units": "kN",
            "points": [
                { "appliedLoad": 10.0, "runReadings": [10.1, 10.0, 9.9] },
                { "appliedLoad": 20.0, "runReadings": [20.1, 19.9] }
            ]
        }
    }))
    .unwrap();
    assert_eq!(summarize_results(&load_cell), "2 load points, 3 runs");
}

#[test]
fn format_report_summarizes_counts() {
    assert_eq!(format_report(&SyncReport::default()), "Already up to date.");

    let report = SyncReport {
        pushed: 3,
        reconciled: 1,
        coalesced: 2,
        ..SyncReport::default()
    };
    assert_eq!(
        format_report(&report),
        "Synced: 3 pushed, 1 reconciled, 2 coalesced"
    );
}

#[test]
fn format_report_counts_reconcile_only_cycles() {
    let report = SyncReport {
        reconciled: 2,
        ..SyncReport::default()
    };
    assert_eq!(format_report(&report), "Synced: 0 pushed, 2 reconciled");
}

#[test]
fn format_status_lines_includes_errors() {
    let status = SyncStatus {
        phase: SyncPhase::Error,
        pending_count: 4,
        failed_count: 1,
        last_error: Some("customer 1: HTTP 500".to_string()),
        ..SyncStatus::default()
    };

    let lines = format_status_lines(&status, None);
    assert_eq!(lines[0], "Remote:       (not configured)");
    assert_eq!(lines[1], "Connectivity: offline");
    assert_eq!(lines[2], "Sync phase:   error");
    assert_eq!(lines[3], "Pending:      4");
    assert_eq!(lines[4], "Last sync:    never");
    assert!(lines.contains(&"Last error:   customer 1: HTTP 500".to_string()));
}

#[tokio::test(flavor = "current_thread")]
async fn run_customer_add_and_delete_track_queue() {
    let (_dir, ctx) = test_context();

    run_customer_add(&ctx, CustomerData::new("Acme Testing"))
        .await
        .unwrap();

    let service = ctx.open_service().await.unwrap();
    let customers = service.get_all_customers().await.unwrap();
    assert_eq!(customers.len(), 1);
    let id = customers[0].id.to_string();

    run_customer_delete(&ctx, &id).await.unwrap();
    run_queue(&ctx, true).await.unwrap();

    let entries = service.pending_mutations().await.unwrap();
    let operations: Vec<Operation> = entries.iter().map(|entry| entry.operation).collect();
    assert_eq!(operations, vec![Operation::Create, Operation::Delete]);
    assert!(service.get_all_customers().await.unwrap().is_empty());

    let lines = format_queue_lines(&entries, &Utc::now());
    assert!(lines[0].contains("create"));
    assert!(lines[1].contains(&id));
}

#[tokio::test(flavor = "current_thread")]
async fn run_customer_show_reports_missing_record() {
    let (_dir, ctx) = test_context();
    let error = run_customer_show(&ctx, &EntityId::new().to_string(), false)
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        CliError::NotFound {
            kind: EntityKind::Customer,
            ..
        }
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn run_calibration_add_requires_local_equipment() {
    let (_dir, ctx) = test_context();
    let error = run_calibration_add(&ctx, calibration_request(&EntityId::new()))
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        CliError::NotFound {
            kind: EntityKind::Equipment,
            ..
        }
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn run_calibration_add_copies_owner_and_type_from_equipment() {
    let (_dir, ctx) = test_context();
    let service = ctx.open_service().await.unwrap();
    let customer = service
        .add_customer(CustomerData::new("Acme Testing"))
        .await
        .unwrap();
    let equipment = service
        .add_equipment(EquipmentData::new(
            "Frame 2",
            EquipmentType::SpeedDisplacement,
            customer.id.clone(),
        ))
        .await
        .unwrap();

    run_calibration_add(&ctx, calibration_request(&equipment.id))
        .await
        .unwrap();
    run_calibration_list(&ctx, Some(equipment.id.as_str()), None, false)
        .await
        .unwrap();

    let calibrations = service.get_all_calibrations().await.unwrap();
    assert_eq!(calibrations.len(), 1);
    let calibration = &calibrations[0];
    assert_eq!(calibration.data.customer_id, customer.id);
    assert_eq!(
        calibration.data.calibration_type,
        EquipmentType::SpeedDisplacement
    );
    assert_eq!(
        calibration.data.results,
        CalibrationResults::empty(EquipmentType::SpeedDisplacement)
    );
    assert!(calibration.dirty);

    let lines = format_calibration_lines(&calibrations);
    assert!(lines[0].contains("2024-06-01"));
    assert!(lines[0].contains("pass"));
}

#[tokio::test(flavor = "current_thread")]
async fn run_calibration_add_rejects_malformed_results_file() {
    let (dir, ctx) = test_context();
    let service = ctx.open_service().await.unwrap();
    let equipment = service
        .add_equipment(EquipmentData::new(
            "Load cell 7",
            EquipmentType::LoadCell,
            EntityId::new(),
        ))
        .await
        .unwrap();

    let results_file = dir.path().join("results.json");
    std::fs::write(&results_file, "{ not json").unwrap();

    let mut request = calibration_request(&equipment.id);
    request.results_file = Some(results_file);
    let error = run_calibration_add(&ctx, request).await.unwrap_err();
    assert!(matches!(error, CliError::InvalidResults(_)));
    assert!(service.get_all_calibrations().await.unwrap().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn run_sync_requires_sync_configuration() {
    let (_dir, ctx) = test_context();
    let error = run_sync(&ctx).await.unwrap_err();
    assert!(matches!(error, CliError::SyncNotConfigured));
}

#[tokio::test(flavor = "current_thread")]
async fn run_sync_requires_token() {
    let (_dir, mut ctx) = test_context();
    ctx.settings.api_url = Some("http://127.0.0.1:9".to_string());
    let error = run_sync(&ctx).await.unwrap_err();
    assert!(matches!(error, CliError::SyncNotConfigured));
}
