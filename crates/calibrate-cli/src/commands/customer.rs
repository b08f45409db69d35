use calibrate_core::models::CustomerIndex;
use calibrate_core::{Customer, CustomerData, EntityKind};

use crate::commands::common::{not_found, parse_id, print_json, sync_marker, truncate, CliContext};
use crate::error::CliError;

pub async fn run_customer_add(ctx: &CliContext, data: CustomerData) -> Result<(), CliError> {
    let service = ctx.open_service().await?;
    let customer = service.add_customer(data).await?;
    println!("{}", customer.id);
    Ok(())
}

pub async fn run_customer_list(
    ctx: &CliContext,
    name: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let service = ctx.open_service().await?;
    let customers = match name {
        Some(name) => {
            service
                .get_customers_by_index(CustomerIndex::Name, name)
                .await?
        }
        None => service.get_all_customers().await?,
    };

    if as_json {
        return print_json(&customers);
    }
    if customers.is_empty() {
        println!("No customers recorded.");
    }
    for line in format_customer_lines(&customers) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_customer_show(ctx: &CliContext, id: &str, as_json: bool) -> Result<(), CliError> {
    let id = parse_id(EntityKind::Customer, id)?;
    let service = ctx.open_service().await?;
    let customer = service
        .get_customer_by_id(&id)
        .await?
        .ok_or_else(|| not_found(EntityKind::Customer, &id))?;

    if as_json {
        return print_json(&customer);
    }
    println!("ID:       {}", customer.id);
    println!("Name:     {}", customer.data.name);
    for (label, value) in [
        ("Location", &customer.data.location),
        ("Contact", &customer.data.contact_name),
        ("Email", &customer.data.email),
        ("Phone", &customer.data.phone),
        ("Notes", &customer.data.notes),
    ] {
        if let Some(value) = value {
            println!("{:<9} {value}", format!("{label}:"));
        }
    }
    println!("Synced:   {}", if customer.dirty { "no" } else { "yes" });
    Ok(())
}

pub async fn run_customer_delete(ctx: &CliContext, id: &str) -> Result<(), CliError> {
    let id = parse_id(EntityKind::Customer, id)?;
    let service = ctx.open_service().await?;
    service.delete_customer(&id).await?;
    println!("{id}");
    Ok(())
}

pub fn format_customer_lines(customers: &[Customer]) -> Vec<String> {
    customers
        .iter()
        .map(|customer| {
            let location = customer.data.location.as_deref().unwrap_or("-");
            format!(
                "{} {}  {:<30}  {}",
                sync_marker(customer.dirty),
                customer.id,
                truncate(&customer.data.name, 30),
                truncate(location, 40)
            )
        })
        .collect()
}
