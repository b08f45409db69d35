use calibrate_core::models::{EquipmentIndex, EquipmentType, Specifications};
use calibrate_core::{EntityKind, Equipment, EquipmentData};

use crate::commands::common::{not_found, parse_id, print_json, sync_marker, truncate, CliContext};
use crate::error::CliError;

pub async fn run_equipment_add(
    ctx: &CliContext,
    name: String,
    equipment_type: EquipmentType,
    customer: &str,
    serial_number: Option<String>,
    specifications: Specifications,
) -> Result<(), CliError> {
    let customer_id = parse_id(EntityKind::Customer, customer)?;
    let service = ctx.open_service().await?;
    if service.get_customer_by_id(&customer_id).await?.is_none() {
        eprintln!("warning: customer {customer_id} is not stored locally");
    }

    let mut data = EquipmentData::new(name, equipment_type, customer_id);
    data.serial_number = serial_number;
    data.specifications = specifications;
    let equipment = service.add_equipment(data).await?;
    println!("{}", equipment.id);
    Ok(())
}

pub async fn run_equipment_list(
    ctx: &CliContext,
    customer: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let service = ctx.open_service().await?;
    let equipment = match customer {
        Some(customer) => {
            let customer_id = parse_id(EntityKind::Customer, customer)?;
            service
                .get_equipment_by_index(EquipmentIndex::CustomerId, customer_id.as_str())
                .await?
        }
        None => service.get_all_equipment().await?,
    };

    if as_json {
        return print_json(&equipment);
    }
    if equipment.is_empty() {
        println!("No equipment recorded.");
    }
    for line in format_equipment_lines(&equipment) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_equipment_show(ctx: &CliContext, id: &str, as_json: bool) -> Result<(), CliError> {
    let id = parse_id(EntityKind::Equipment, id)?;
    let service = ctx.open_service().await?;
    let equipment = service
        .get_equipment_by_id(&id)
        .await?
        .ok_or_else(|| not_found(EntityKind::Equipment, &id))?;

    if as_json {
        return print_json(&equipment);
    }

    // Soft reference: the owning customer may be gone.
    let owner = service
        .get_customer_by_id(&equipment.data.customer_id)
        .await?
        .map_or_else(
            || format!("{} (missing)", equipment.data.customer_id),
            |customer| format!("{} ({})", customer.data.name, customer.id),
        );

    let specs = &equipment.data.specifications;
    println!("ID:        {}", equipment.id);
    println!("Name:      {}", equipment.data.name);
    println!("Type:      {}", equipment.data.equipment_type);
    println!("Customer:  {owner}");
    for (label, value) in [
        ("Serial", &equipment.data.serial_number),
        ("Capacity", &specs.capacity),
        ("Accuracy", &specs.accuracy),
        ("Range", &specs.range),
        ("Units", &specs.units),
    ] {
        if let Some(value) = value {
            println!("{:<10} {value}", format!("{label}:"));
        }
    }
    println!("Synced:    {}", if equipment.dirty { "no" } else { "yes" });
    Ok(())
}

pub async fn run_equipment_delete(ctx: &CliContext, id: &str) -> Result<(), CliError> {
    let id = parse_id(EntityKind::Equipment, id)?;
    let service = ctx.open_service().await?;
    service.delete_equipment(&id).await?;
    println!("{id}");
    Ok(())
}

pub fn format_equipment_lines(equipment: &[Equipment]) -> Vec<String> {
    equipment
        .iter()
        .map(|item| {
            format!(
                "{} {}  {:<30}  {:<18}  {}",
                sync_marker(item.dirty),
                item.id,
                truncate(&item.data.name, 30),
                item.data.equipment_type.as_str(),
                item.data.serial_number.as_deref().unwrap_or("-")
            )
        })
        .collect()
}
