//! Calendar cell classification
//!
//! Booking widgets encode a day's availability as a handful of CSS markers.
//! A cell blocked at only one end is still bookable for half a stay, so the
//! markers map onto four states rather than a yes/no flag. Rules are
//! evaluated in order and the first match wins:
//!
//! 1. start-blocked and end-blocked → unavailable
//! 2. start-blocked only → partial_no_start (check-out only)
//! 3. end-blocked only → partial_no_end (check-in only)
//! 4. no disallowed marker and no occupied label → available
//! 5. anything else → unavailable

use chrono::NaiveDate;

use crate::models::{AvailabilityDay, AvailabilityState, CalendarCell};

/// State and check-in/check-out flags for one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub state: AvailabilityState,
    pub can_checkin: bool,
    pub can_checkout: bool,
}

impl Classification {
    const fn new(state: AvailabilityState, can_checkin: bool, can_checkout: bool) -> Self {
        Self {
            state,
            can_checkin,
            can_checkout,
        }
    }

    /// Attach a calendar date
    pub fn on(self, date: NaiveDate) -> AvailabilityDay {
        AvailabilityDay {
            date,
            state: self.state,
            can_checkin: self.can_checkin,
            can_checkout: self.can_checkout,
        }
    }
}

const UNAVAILABLE: Classification = Classification::new(AvailabilityState::Unavailable, false, false);

/// Pure cell classifier
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    /// Lowercased tooltip phrases that mean "taken"
    occupied_phrases: Vec<String>,
}

impl Classifier {
    pub fn new<I, S>(occupied_phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            occupied_phrases: occupied_phrases
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Classify one cell; `None` for filler cells from adjacent months
    pub fn classify(&self, cell: &CalendarCell) -> Option<Classification> {
        if !cell.in_displayed_month {
            return None;
        }

        let classification = match (cell.start_blocked, cell.end_blocked) {
            (true, true) => UNAVAILABLE,
            (true, false) => Classification::new(AvailabilityState::PartialNoStart, false, true),
            (false, true) => Classification::new(AvailabilityState::PartialNoEnd, true, false),
            (false, false) if !cell.disallowed && !self.is_occupied(cell) => {
                Classification::new(AvailabilityState::Available, true, true)
            }
            (false, false) => UNAVAILABLE,
        };

        Some(classification)
    }

    fn is_occupied(&self, cell: &CalendarCell) -> bool {
        if cell.occupied_label {
            return true;
        }
        match &cell.tooltip {
            Some(tooltip) => {
                let tooltip = tooltip.to_lowercase();
                self.occupied_phrases.iter().any(|p| tooltip.contains(p.as_str()))
            }
            None => false,
        }
    }
}
