//! Range-scoped availability synchronization
//!
//! A scrape only proves something about the months it looked at. The
//! synchronizer therefore replaces stored availability for exactly the
//! scraped range and nothing else: scraping September twice a day never
//! erases October.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{AvailabilityDay, AvailabilityRecord, ScrapeRange};
use crate::storage::repository::AvailabilityRepository;

/// What one synchronization did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub room_type_id: i64,
    pub range: ScrapeRange,
    pub records_written: usize,
    /// Unavailable days dropped before writing
    pub unavailable_days: usize,
}

/// Writes scrape results into an availability repository
#[derive(Clone)]
pub struct Synchronizer {
    repo: Arc<dyn AvailabilityRepository>,
}

impl Synchronizer {
    pub fn new(repo: Arc<dyn AvailabilityRepository>) -> Self {
        Self { repo }
    }

    /// Replace the stored availability of one room type for `range`
    ///
    /// Every day must fall inside `range` and appear once; the input is
    /// rejected before any write otherwise. Unavailable days are dropped, so
    /// an empty or all-unavailable input clears the range.
    pub fn sync(
        &self,
        room_type_id: i64,
        range: ScrapeRange,
        days: &[AvailabilityDay],
    ) -> Result<SyncOutcome> {
        let records = build_records(room_type_id, range, days)?;
        let unavailable_days = days.len() - records.len();

        let records_written = self.repo.replace_range(room_type_id, range, &records)?;

        tracing::info!(
            room_type_id,
            range = %range,
            records_written,
            unavailable_days,
            "Availability synchronized"
        );

        Ok(SyncOutcome {
            room_type_id,
            range,
            records_written,
            unavailable_days,
        })
    }
}

fn build_records(
    room_type_id: i64,
    range: ScrapeRange,
    days: &[AvailabilityDay],
) -> Result<Vec<AvailabilityRecord>> {
    let synced_at = Utc::now();
    let mut seen = HashSet::with_capacity(days.len());
    let mut records = Vec::with_capacity(days.len());

    for day in days {
        if !range.contains(day.date) {
            return Err(Error::validation(format!(
                "day {} is outside the synchronized range {range}",
                day.date
            )));
        }
        if !seen.insert(day.date) {
            return Err(Error::validation(format!("day {} appears twice", day.date)));
        }
        if !day.state.is_persisted() {
            continue;
        }
        records.push(AvailabilityRecord {
            room_type_id,
            date: day.date,
            can_checkin: day.can_checkin,
            can_checkout: day.can_checkout,
            synced_at,
        });
    }

    Ok(records)
}
