use anyhow::{Context, Result};

use calsync::config::Config;
use calsync::storage::CatalogRepository;

use super::open_store;

pub fn list_properties(config: &Config, filter: Option<&str>) -> Result<()> {
    let store = open_store(config)?;
    let properties = store.active_properties(filter)?;

    if properties.is_empty() {
        println!("No active properties.");
        println!("Run 'calsync properties add' to register one.");
        return Ok(());
    }

    println!("Active properties");
    println!("=================");
    for property in &properties {
        println!(
            "\n[{}] {} (ref: {})",
            property.id, property.name, property.booking_reference
        );
        let rooms = store.active_room_types(property.id)?;
        if rooms.is_empty() {
            println!("   (no active room types)");
        }
        for room in rooms {
            println!(
                "   - [{}] {} | external id: {} | capacity: {}",
                room.id, room.name, room.external_id, room.capacity
            );
        }
    }
    Ok(())
}

pub fn add_property(config: &Config, name: &str, booking_reference: &str) -> Result<()> {
    let store = open_store(config)?;
    let property = store
        .add_property(name, booking_reference)
        .with_context(|| format!("Failed to add property '{name}'"))?;
    tracing::info!(id = property.id, name = %property.name, "Property added");
    println!("Added property {} ({})", property.id, property.name);
    Ok(())
}

pub fn add_room_type(
    config: &Config,
    property_id: i64,
    external_id: &str,
    name: &str,
    capacity: u32,
) -> Result<()> {
    let store = open_store(config)?;
    let room = store
        .add_room_type(property_id, external_id, name, capacity)
        .with_context(|| format!("Failed to add room type '{name}'"))?;
    tracing::info!(id = room.id, property_id, external_id, "Room type added");
    println!("Added room type {} ({}) to property {property_id}", room.id, room.name);
    Ok(())
}

pub fn deactivate_property(config: &Config, property_id: i64) -> Result<()> {
    let store = open_store(config)?;
    store.set_property_active(property_id, false)?;
    println!("Property {property_id} deactivated");
    Ok(())
}
