use calibrate_core::queue::QueueEntry;
use chrono::Utc;

use crate::commands::common::{format_relative_time, print_json, CliContext};
use crate::error::CliError;

pub async fn run_queue(ctx: &CliContext, as_json: bool) -> Result<(), CliError> {
    let service = ctx.open_service().await?;
    let entries = service.pending_mutations().await?;

    if as_json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("Nothing waiting to sync.");
        return Ok(());
    }
    for line in format_queue_lines(&entries, &Utc::now()) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_queue_lines(entries: &[QueueEntry], now: &chrono::DateTime<Utc>) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!(
                "{:>6}  {:<6}  {:<11}  {}  {}",
                entry.seq,
                entry.operation.as_str(),
                entry.kind.as_str(),
                entry.entity_id,
                format_relative_time(&entry.enqueued_at, now)
            )
        })
        .collect()
}
