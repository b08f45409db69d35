use calibrate_core::{SkipReason, SyncOutcome, SyncReport};

use crate::commands::common::CliContext;
use crate::error::CliError;

pub async fn run_sync(ctx: &CliContext) -> Result<(), CliError> {
    if !ctx.settings.is_configured() || ctx.settings.api_token.is_none() {
        return Err(CliError::SyncNotConfigured);
    }

    let service = ctx.open_service().await?;
    match service.force_sync().await {
        SyncOutcome::Skipped(SkipReason::Offline) => Err(CliError::Offline),
        SyncOutcome::Skipped(SkipReason::NoCredentials) => Err(CliError::SyncNotConfigured),
        SyncOutcome::Skipped(SkipReason::InProgress) => {
            println!("A sync is already running.");
            Ok(())
        }
        SyncOutcome::Completed(report) => {
            if !report.is_clean() {
                let message = report
                    .last_error
                    .clone()
                    .unwrap_or_else(|| format!("{} item(s) failed", report.failed));
                return Err(CliError::SyncFailed(message));
            }
            println!("{}", format_report(&report));
            let pending = service.pending_count().await?;
            if pending > 0 {
                println!("{pending} change(s) still pending");
            }
            Ok(())
        }
    }
}

pub fn format_report(report: &SyncReport) -> String {
    if report.pushed == 0
        && report.reconciled == 0
        && report.coalesced == 0
        && report.dropped == 0
    {
        return "Already up to date.".to_string();
    }

    // Reconciled records are written outside the queue and not counted in `pushed`.
    let mut summary = format!("Synced: {} pushed", report.pushed);
    if report.reconciled > 0 {
        summary.push_str(&format!(", {} reconciled", report.reconciled));
    }
    if report.coalesced > 0 {
        summary.push_str(&format!(", {} coalesced", report.coalesced));
    }
    if report.dropped > 0 {
        summary.push_str(&format!(", {} dropped", report.dropped));
    }
    summary
}
