use calibrate_core::models::{ToolCategory, ToolIndex, ToolStatus};
use calibrate_core::{EntityKind, Tool, ToolData};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::commands::common::{not_found, parse_id, print_json, sync_marker, truncate, CliContext};
use crate::error::CliError;

/// A tool with its calibration status as of today
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolListItem<'a> {
    #[serde(flatten)]
    pub tool: &'a Tool,
    pub current_status: ToolStatus,
}

pub async fn run_tool_add(ctx: &CliContext, data: ToolData) -> Result<(), CliError> {
    let service = ctx.open_service().await?;
    let tool = service.add_tool(data).await?;
    println!("{}", tool.id);
    Ok(())
}

pub async fn run_tool_list(
    ctx: &CliContext,
    category: Option<ToolCategory>,
    status: Option<ToolStatus>,
    as_json: bool,
) -> Result<(), CliError> {
    let service = ctx.open_service().await?;
    let tools = match category {
        Some(category) => {
            service
                .get_tools_by_index(ToolIndex::Category, category.as_str())
                .await?
        }
        None => service.get_all_tools().await?,
    };

    let today = Utc::now().date_naive();
    let items = tool_list_items(&tools, status, today);

    if as_json {
        return print_json(&items);
    }
    if items.is_empty() {
        println!("No tools recorded.");
    }
    for line in format_tool_lines(&items) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_tool_show(ctx: &CliContext, id: &str, as_json: bool) -> Result<(), CliError> {
    let id = parse_id(EntityKind::Tool, id)?;
    let service = ctx.open_service().await?;
    let tool = service
        .get_tool_by_id(&id)
        .await?
        .ok_or_else(|| not_found(EntityKind::Tool, &id))?;
    let current_status = tool.data.derived_status(Utc::now().date_naive());

    if as_json {
        return print_json(&ToolListItem {
            tool: &tool,
            current_status,
        });
    }

    println!("ID:           {}", tool.id);
    println!("Name:         {}", tool.data.name);
    println!("Category:     {}", tool.data.category.as_str());
    println!("Status:       {current_status}");
    let last = tool.data.last_calibration_date.map(|date| date.to_string());
    let next = tool.data.next_calibration_date.map(|date| date.to_string());
    for (label, value) in [
        ("Serial", &tool.data.serial_number),
        ("Manufacturer", &tool.data.manufacturer),
        ("Model", &tool.data.model),
        ("Accuracy", &tool.data.accuracy),
        ("Range", &tool.data.range),
        ("Calibrated", &last),
        ("Next due", &next),
        ("Certificate", &tool.data.certificate_number),
        ("Notes", &tool.data.notes),
    ] {
        if let Some(value) = value {
            println!("{:<13} {value}", format!("{label}:"));
        }
    }
    println!("Synced:       {}", if tool.dirty { "no" } else { "yes" });
    Ok(())
}

pub async fn run_tool_delete(ctx: &CliContext, id: &str) -> Result<(), CliError> {
    let id = parse_id(EntityKind::Tool, id)?;
    let service = ctx.open_service().await?;
    service.delete_tool(&id).await?;
    println!("{id}");
    Ok(())
}

pub fn tool_list_items(
    tools: &[Tool],
    status: Option<ToolStatus>,
    today: NaiveDate,
) -> Vec<ToolListItem<'_>> {
    tools
        .iter()
        .map(|tool| ToolListItem {
            tool,
            current_status: tool.data.derived_status(today),
        })
        .filter(|item| status.is_none_or(|status| item.current_status == status))
        .collect()
}

pub fn format_tool_lines(items: &[ToolListItem<'_>]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let next_due = item
                .tool
                .data
                .next_calibration_date
                .map_or_else(|| "-".to_string(), |date| date.to_string());
            format!(
                "{} {}  {:<30}  {:<17}  {:<14}  due {}",
                sync_marker(item.tool.dirty),
                item.tool.id,
                truncate(&item.tool.data.name, 30),
                item.tool.data.category.as_str(),
                item.current_status.as_str(),
                next_due
            )
        })
        .collect()
}
