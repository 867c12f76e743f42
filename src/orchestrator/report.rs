//! Run report
//!
//! Concurrent tasks never touch the report. Each returns an outcome value and
//! the orchestrator folds them in once their batch has finished.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::{Property, RoomType};
use crate::storage::SyncOutcome;
use crate::utils::truncate_text;

/// Longest failure reason kept in a report
const MAX_REASON_LEN: usize = 300;

/// One task (or property) that did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub property: String,
    /// `None` when the property failed before any room type ran
    pub room: Option<String>,
    pub reason: String,
    pub category: String,
    pub attempts: u32,
}

impl TaskFailure {
    pub fn for_room(property: &Property, room: &RoomType, error: &Error, attempts: u32) -> Self {
        Self {
            property: property.name.clone(),
            room: Some(room.name.clone()),
            reason: truncate_text(&error.to_string(), MAX_REASON_LEN),
            category: error.category().as_str().to_string(),
            attempts,
        }
    }

    pub fn for_property(property: &Property, error: &Error) -> Self {
        Self {
            property: property.name.clone(),
            room: None,
            reason: truncate_text(&error.to_string(), MAX_REASON_LEN),
            category: error.category().as_str().to_string(),
            attempts: 1,
        }
    }
}

/// Result of one scrape task after retries
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Synced(SyncOutcome),
    Failed(TaskFailure),
}

/// Everything that happened to one property
#[derive(Debug, Clone, Default)]
pub struct PropertyOutcome {
    pub room_types: usize,
    pub tasks: Vec<TaskOutcome>,
    pub failure: Option<TaskFailure>,
    pub cancelled: bool,
}

/// Aggregate handed back to the caller of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub properties_processed: usize,
    pub room_types_processed: usize,
    pub tasks_succeeded: usize,
    pub records_written: usize,
    pub failures: Vec<TaskFailure>,
    /// Set when a shutdown signal stopped the run between batches
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    pub fn start() -> Self {
        Self {
            properties_processed: 0,
            room_types_processed: 0,
            tasks_succeeded: 0,
            records_written: 0,
            failures: Vec::new(),
            cancelled: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Fold one property's outcome into the report
    pub fn absorb(&mut self, outcome: PropertyOutcome) {
        self.properties_processed += 1;
        self.room_types_processed += outcome.room_types;
        self.cancelled |= outcome.cancelled;

        if let Some(failure) = outcome.failure {
            self.failures.push(failure);
        }

        for task in outcome.tasks {
            match task {
                TaskOutcome::Synced(sync) => {
                    self.tasks_succeeded += 1;
                    self.records_written += sync.records_written;
                }
                TaskOutcome::Failed(failure) => self.failures.push(failure),
            }
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn tasks_failed(&self) -> usize {
        self.failures.iter().filter(|f| f.room.is_some()).count()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}
