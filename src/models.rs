// Core data structures for calsync

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::normalize_whitespace;

// ============================================================================
// Catalog
// ============================================================================

/// A bookable location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: i64,
    pub name: String,
    /// Identifier of the property in the external booking system
    pub booking_reference: String,
    pub active: bool,
}

/// One rentable unit category within a property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomType {
    pub id: i64,
    pub property_id: i64,
    /// Token used to select the room in the booking widget
    pub external_id: String,
    pub name: String,
    pub capacity: u32,
    pub active: bool,
}

/// Check that every external identity is unique within its property
pub fn validate_room_types(room_types: &[RoomType]) -> Result<()> {
    let mut seen = HashSet::new();
    for room in room_types {
        if room.external_id.trim().is_empty() {
            return Err(Error::validation(format!(
                "room type {} has an empty external id",
                room.id
            )));
        }
        if !seen.insert((room.property_id, room.external_id.as_str())) {
            return Err(Error::validation(format!(
                "duplicate external id '{}' in property {}",
                room.external_id, room.property_id
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Calendar extraction
// ============================================================================

/// One rendered day cell, as read from the widget
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarCell {
    pub day: u32,
    /// False for filler cells from adjacent months
    pub in_displayed_month: bool,
    pub start_blocked: bool,
    pub end_blocked: bool,
    pub disallowed: bool,
    pub occupied_label: bool,
    pub tooltip: Option<String>,
}

impl CalendarCell {
    /// Plain in-month cell with no markers set
    pub fn open(day: u32) -> Self {
        Self {
            day,
            in_displayed_month: true,
            ..Default::default()
        }
    }
}

/// Availability state of a single day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityState {
    Available,
    /// A stay may end on this day but not begin
    PartialNoStart,
    /// A stay may begin on this day but not end
    PartialNoEnd,
    Unavailable,
}

impl AvailabilityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::PartialNoStart => "partial_no_start",
            Self::PartialNoEnd => "partial_no_end",
            Self::Unavailable => "unavailable",
        }
    }

    /// Whether days in this state produce a stored record
    pub fn is_persisted(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Self::PartialNoStart | Self::PartialNoEnd)
    }
}

impl fmt::Display for AvailabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityDay {
    pub date: NaiveDate,
    pub state: AvailabilityState,
    pub can_checkin: bool,
    pub can_checkout: bool,
}

// ============================================================================
// Storage
// ============================================================================

/// Persisted availability for one (room type, date)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub room_type_id: i64,
    pub date: NaiveDate,
    pub can_checkin: bool,
    pub can_checkout: bool,
    pub synced_at: DateTime<Utc>,
}

/// One synchronized range in the coverage ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageEntry {
    pub room_type_id: i64,
    pub range: ScrapeRange,
    pub synced_at: DateTime<Utc>,
    pub records_written: usize,
}

// ============================================================================
// Months and ranges
// ============================================================================

/// A calendar month targeted by a scrape, e.g. "September 2025"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetMonth {
    year: i32,
    month: u32,
}

impl TargetMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::validation(format!("month {month} out of range")));
        }
        Ok(Self { year, month })
    }

    /// Month containing the given date
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// `count` consecutive months starting at `start`
    pub fn sequence(start: TargetMonth, count: usize) -> Vec<TargetMonth> {
        (0..count as u32)
            .filter_map(|offset| start.first_day().checked_add_months(Months::new(offset)))
            .map(TargetMonth::containing)
            .collect()
    }

    /// Calendar order with repeats removed; the month walker only moves forward
    pub fn ordered(months: &[TargetMonth]) -> Vec<TargetMonth> {
        let mut ordered = months.to_vec();
        ordered.sort_unstable();
        ordered.dedup();
        ordered
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.first_day()
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    /// Date for a day-of-month, `None` if the day does not exist in this month
    pub fn day(&self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }

    /// Widget label form, e.g. "September 2025"
    pub fn label(&self) -> String {
        self.first_day().format("%B %Y").to_string()
    }

    /// Whether a label read from the widget denotes this month
    pub fn matches_label(&self, displayed: &str) -> bool {
        normalize_whitespace(displayed).eq_ignore_ascii_case(&self.label())
    }
}

impl fmt::Display for TargetMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for TargetMonth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = normalize_whitespace(s);
        // Both "September 2025" and "2025-09" are accepted
        let date = NaiveDate::parse_from_str(&format!("1 {normalized}"), "%d %B %Y")
            .or_else(|_| NaiveDate::parse_from_str(&format!("{normalized}-01"), "%Y-%m-%d"))
            .map_err(|_| Error::validation(format!("unrecognized month label '{s}'")))?;
        Ok(Self::containing(date))
    }
}

impl Serialize for TargetMonth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

impl<'de> Deserialize<'de> for TargetMonth {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Inclusive date span covered by one scrape task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScrapeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ScrapeRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::validation(format!(
                "range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Span from the first day of the earliest month to the last day of the latest
    pub fn from_months(months: &[TargetMonth]) -> Option<Self> {
        let start = months.iter().min()?.first_day();
        let end = months.iter().max()?.last_day();
        Some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for ScrapeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}
