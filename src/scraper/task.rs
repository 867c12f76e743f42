//! Scrape task: one room type over an ordered list of months

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{
    AvailabilityDay, AvailabilityState, CalendarCell, Property, RoomType, ScrapeRange, TargetMonth,
};
use crate::scraper::classifier::Classifier;
use crate::scraper::navigator::MonthWalker;
use crate::scraper::session::CalendarSession;

/// Unit of work handed to the orchestrator
#[derive(Debug, Clone)]
pub struct ScrapeTask {
    pub property: Property,
    pub room_type: RoomType,
    months: Vec<TargetMonth>,
    range: ScrapeRange,
}

impl ScrapeTask {
    /// Months are scraped in calendar order, each one once
    pub fn new(property: Property, room_type: RoomType, months: Vec<TargetMonth>) -> Result<Self> {
        let months = TargetMonth::ordered(&months);
        let range = ScrapeRange::from_months(&months)
            .ok_or_else(|| Error::validation("scrape task needs at least one target month"))?;

        if room_type.property_id != property.id {
            return Err(Error::validation(format!(
                "room type {} does not belong to property {}",
                room_type.id, property.id
            )));
        }

        Ok(Self {
            property,
            room_type,
            months,
            range,
        })
    }

    pub fn months(&self) -> &[TargetMonth] {
        &self.months
    }

    pub fn range(&self) -> ScrapeRange {
        self.range
    }
}

/// Day counts for one scraped month
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthSummary {
    pub month: String,
    pub total_days: usize,
    pub available: usize,
    pub partial: usize,
    pub unavailable: usize,
}

impl MonthSummary {
    fn from_days(month: TargetMonth, days: &[AvailabilityDay]) -> Self {
        let mut summary = Self {
            month: month.label(),
            total_days: days.len(),
            ..Default::default()
        };
        for day in days {
            match day.state {
                AvailabilityState::Available => summary.available += 1,
                AvailabilityState::PartialNoStart | AvailabilityState::PartialNoEnd => {
                    summary.partial += 1
                }
                AvailabilityState::Unavailable => summary.unavailable += 1,
            }
        }
        summary
    }

    /// Share of days with at least one of check-in/check-out open (0.0 - 1.0)
    pub fn availability_rate(&self) -> f64 {
        if self.total_days == 0 {
            return 0.0;
        }
        (self.available + self.partial) as f64 / self.total_days as f64
    }
}

/// Per-month and overall statistics of one task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeSummary {
    pub months: Vec<MonthSummary>,
    pub total: MonthSummary,
}

impl ScrapeSummary {
    fn new(months: Vec<MonthSummary>) -> Self {
        let mut total = MonthSummary {
            month: "all".to_string(),
            ..Default::default()
        };
        for m in &months {
            total.total_days += m.total_days;
            total.available += m.available;
            total.partial += m.partial;
            total.unavailable += m.unavailable;
        }
        Self { months, total }
    }
}

/// Result of a successful task
#[derive(Debug, Clone)]
pub struct ScrapeOutput {
    /// Every classified day, in month order
    pub days: Vec<AvailabilityDay>,
    pub range: ScrapeRange,
    pub summary: ScrapeSummary,
}

/// Runs scrape tasks against an open session
#[derive(Debug, Clone, Default)]
pub struct TaskRunner {
    walker: MonthWalker,
    classifier: Classifier,
}

impl TaskRunner {
    pub fn new(walker: MonthWalker, classifier: Classifier) -> Self {
        Self { walker, classifier }
    }

    /// Select the room, then walk and read every target month in order
    ///
    /// Nothing is returned on failure; results from months already read are
    /// dropped and the caller is expected to retry the whole task.
    pub async fn run(
        &self,
        session: &mut dyn CalendarSession,
        task: &ScrapeTask,
    ) -> Result<ScrapeOutput> {
        let room = &task.room_type;

        session.select_room(&room.external_id).await?;
        session.open_calendar().await?;

        let mut days = Vec::new();
        let mut summaries = Vec::with_capacity(task.months.len());

        for &month in &task.months {
            let steps = self.walker.walk_to(session, month).await?;
            let cells = session.calendar_cells().await?;
            let month_days = self.classify_month(month, &cells);

            let summary = MonthSummary::from_days(month, &month_days);
            tracing::debug!(
                room = %room.name,
                month = %month,
                steps,
                days = summary.total_days,
                available = summary.available,
                partial = summary.partial,
                "Month extracted"
            );

            summaries.push(summary);
            days.extend(month_days);
        }

        let summary = ScrapeSummary::new(summaries);
        tracing::info!(
            property = %task.property.name,
            room = %room.name,
            range = %task.range,
            days = summary.total.total_days,
            rate = %format!("{:.2}", summary.total.availability_rate()),
            "Scrape task finished"
        );

        Ok(ScrapeOutput {
            days,
            range: task.range,
            summary,
        })
    }

    fn classify_month(
        &self,
        month: TargetMonth,
        cells: &[CalendarCell],
    ) -> Vec<AvailabilityDay> {
        let mut seen = HashSet::new();
        let mut days = Vec::new();

        for cell in cells {
            let Some(classification) = self.classifier.classify(cell) else {
                continue;
            };
            let Some(date) = month.day(cell.day) else {
                tracing::warn!(month = %month, day = cell.day, "Skipping cell with invalid day");
                continue;
            };
            if !seen.insert(date) {
                tracing::debug!(date = %date, "Skipping duplicate cell");
                continue;
            }
            days.push(classification.on(date));
        }

        days
    }
}
