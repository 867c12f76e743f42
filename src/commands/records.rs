use anyhow::{Context, Result};
use chrono::NaiveDate;

use calsync::config::Config;
use calsync::models::ScrapeRange;
use calsync::storage::AvailabilityRepository;

use super::open_store;

pub fn records(
    config: &Config,
    room_type_id: i64,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    json: bool,
) -> Result<()> {
    let range = match (from, to) {
        (None, None) => None,
        (from, to) => {
            let earliest = NaiveDate::from_ymd_opt(1, 1, 1).context("invalid lower bound")?;
            let latest = NaiveDate::from_ymd_opt(9999, 12, 31).context("invalid upper bound")?;
            Some(ScrapeRange::new(
                from.unwrap_or(earliest),
                to.unwrap_or(latest),
            )?)
        }
    };

    let store = open_store(config)?;
    let records = store
        .records(room_type_id, range)
        .context("Failed to load availability records")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No availability records for room type {room_type_id}.");
        return Ok(());
    }

    println!("Availability for room type {room_type_id}");
    println!("================================");
    for record in &records {
        println!(
            "{}  check-in: {:<5}  check-out: {:<5}  synced: {}",
            record.date,
            record.can_checkin,
            record.can_checkout,
            record.synced_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!("\n{} records", records.len());
    Ok(())
}

pub fn coverage(config: &Config, room_type_id: i64, date: Option<NaiveDate>) -> Result<()> {
    let store = open_store(config)?;

    if let Some(date) = date {
        let covered = store.is_covered(room_type_id, date)?;
        let stored = store
            .records(room_type_id, Some(ScrapeRange::new(date, date)?))?
            .into_iter()
            .next();
        let verdict = match (covered, stored) {
            (_, Some(r)) => format!(
                "available (check-in: {}, check-out: {})",
                r.can_checkin, r.can_checkout
            ),
            (true, None) => "scraped, unavailable".to_string(),
            (false, None) => "never scraped".to_string(),
        };
        println!("{date}: {verdict}");
        return Ok(());
    }

    let entries = store.coverage(room_type_id)?;
    if entries.is_empty() {
        println!("Room type {room_type_id} has never been synchronized.");
        return Ok(());
    }

    println!("Synchronized ranges for room type {room_type_id}");
    println!("================================");
    for entry in &entries {
        println!(
            "{}  {} records  at {}",
            entry.range,
            entry.records_written,
            entry.synced_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
