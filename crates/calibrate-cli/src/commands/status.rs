use calibrate_core::SyncStatus;
use chrono::Utc;
use serde::Serialize;

use crate::commands::common::{format_relative_time, format_timestamp_local, print_json, CliContext};
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport<'a> {
    #[serde(flatten)]
    status: &'a SyncStatus,
    sync_configured: bool,
    db_path: String,
}

pub async fn run_status(ctx: &CliContext, as_json: bool) -> Result<(), CliError> {
    let service = ctx.open_service().await?;
    if ctx.settings.is_configured() {
        service.connectivity().refresh().await;
    }
    let status = service.status();

    if as_json {
        return print_json(&StatusReport {
            status: &status,
            sync_configured: ctx.settings.is_configured(),
            db_path: ctx.db_path.display().to_string(),
        });
    }

    for line in format_status_lines(&status, ctx.settings.api_url.as_deref()) {
        println!("{line}");
    }
    println!("Database:     {}", ctx.db_path.display());
    Ok(())
}

pub fn format_status_lines(status: &SyncStatus, api_url: Option<&str>) -> Vec<String> {
    let mut lines = vec![
        format!("Remote:       {}", api_url.unwrap_or("(not configured)")),
        format!(
            "Connectivity: {}",
            if status.is_online() { "online" } else { "offline" }
        ),
        format!("Sync phase:   {}", status.phase),
        format!("Pending:      {}", status.pending_count),
    ];

    let last_sync = status.last_sync_at.map_or_else(
        || "never".to_string(),
        |at| {
            format!(
                "{} ({})",
                format_timestamp_local(&at),
                format_relative_time(&at, &Utc::now())
            )
        },
    );
    lines.push(format!("Last sync:    {last_sync}"));

    if status.failed_count > 0 {
        lines.push(format!("Failed items: {}", status.failed_count));
    }
    if let Some(error) = &status.last_error {
        lines.push(format!("Last error:   {error}"));
    }
    lines
}
