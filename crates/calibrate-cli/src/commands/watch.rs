use calibrate_core::SyncStatus;
use chrono::Utc;

use crate::commands::common::{format_timestamp_local, CliContext};
use crate::error::CliError;

/// Keep the service running, printing every status change until Ctrl-C.
pub async fn run_watch(ctx: &CliContext) -> Result<(), CliError> {
    let service = ctx.open_service().await?;
    if !ctx.settings.is_configured() {
        eprintln!("Sync is not configured; watching local changes only.");
    }

    let _subscription = service.subscribe_to_status(|status| {
        println!("{}", format_status_event(status));
    });
    let tasks = service.start();

    tokio::signal::ctrl_c().await?;
    tasks.shutdown().await;
    Ok(())
}

pub fn format_status_event(status: &SyncStatus) -> String {
    let mut line = format!(
        "[{}] {} {} pending={}",
        format_timestamp_local(&Utc::now()),
        if status.is_online() { "online " } else { "offline" },
        status.phase,
        status.pending_count
    );
    if let Some(error) = &status.last_error {
        line.push_str(&format!(" error={error}"));
    }
    line
}
