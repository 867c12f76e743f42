//! Scrape run orchestration
//!
//! A run discovers the active catalog and turns every active room type into
//! one [`ScrapeTask`] over the requested months. Tasks execute under two
//! nested bounds:
//!
//! - properties run in batches of `property_concurrency`
//! - within one property, room types run in batches of `room_concurrency`
//!
//! A politeness delay separates consecutive batches at both levels. A
//! shutdown signal is honoured between batches only; tasks already in flight
//! always finish so no browser session is abandoned mid-interaction.
//!
//! Every task is retried as a whole (fresh session, scrape, synchronize)
//! according to the configured [`RetryConfig`]. Failures end up in the
//! [`RunReport`] and never abort the run.

pub mod report;

pub use report::{PropertyOutcome, RunReport, TaskFailure, TaskOutcome};

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{validate_room_types, Property, RoomType, TargetMonth};
use crate::scraper::{Classifier, MonthWalker, ScrapeTask, SessionFactory, TaskRunner};
use crate::storage::{AvailabilityRepository, CatalogRepository, SyncOutcome, Synchronizer};
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Batch sizes, delays and retry policy of a run
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub property_concurrency: usize,
    pub room_concurrency: usize,
    pub batch_delay: Duration,
    pub retry: RetryConfig,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            property_concurrency: config.scraper.property_concurrency.max(1),
            room_concurrency: config.scraper.room_concurrency.max(1),
            batch_delay: config.batch_delay(),
            retry: config.retry_policy(),
        }
    }
}

/// Runs scrape tasks for the whole catalog
pub struct Orchestrator {
    catalog: Arc<dyn CatalogRepository>,
    synchronizer: Synchronizer,
    sessions: Arc<dyn SessionFactory>,
    runner: TaskRunner,
    settings: OrchestratorSettings,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        availability: Arc<dyn AvailabilityRepository>,
        sessions: Arc<dyn SessionFactory>,
        runner: TaskRunner,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            catalog,
            synchronizer: Synchronizer::new(availability),
            sessions,
            runner,
            settings,
            shutdown: None,
        }
    }

    /// Build the walker, classifier and batch settings from configuration
    pub fn from_config(
        config: &Config,
        catalog: Arc<dyn CatalogRepository>,
        availability: Arc<dyn AvailabilityRepository>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        let runner = TaskRunner::new(
            MonthWalker::new(config.scraper.max_month_steps, config.settle_delay()),
            Classifier::new(&config.scraper.occupied_phrases),
        );
        Self::new(
            catalog,
            availability,
            sessions,
            runner,
            OrchestratorSettings::from_config(config),
        )
    }

    /// Stop starting new batches once `shutdown` turns true
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Scrape `months` for every active property matching `property_filter`
    ///
    /// Only catalog discovery can fail the run itself; task failures are
    /// recorded in the report.
    pub async fn run(
        &self,
        months: &[TargetMonth],
        property_filter: Option<&str>,
    ) -> Result<RunReport> {
        if months.is_empty() {
            return Err(Error::validation("a run needs at least one target month"));
        }
        let months = &TargetMonth::ordered(months)[..];

        let properties = self.catalog.active_properties(property_filter)?;
        let mut report = RunReport::start();

        info!(
            properties = properties.len(),
            months = months.len(),
            filter = property_filter.unwrap_or("-"),
            property_concurrency = self.settings.property_concurrency,
            room_concurrency = self.settings.room_concurrency,
            "Starting scrape run"
        );

        for (index, batch) in properties
            .chunks(self.settings.property_concurrency)
            .enumerate()
        {
            if index > 0 && self.pause().await {
                report.cancelled = true;
                break;
            }

            debug!(batch = index + 1, size = batch.len(), "Running property batch");
            let outcomes = join_all(batch.iter().map(|p| self.run_property(p, months))).await;
            for outcome in outcomes {
                report.absorb(outcome);
            }
        }

        let report = report.finish();
        info!(
            properties = report.properties_processed,
            room_types = report.room_types_processed,
            succeeded = report.tasks_succeeded,
            failed = report.failures.len(),
            records = report.records_written,
            cancelled = report.cancelled,
            "Scrape run finished"
        );
        Ok(report)
    }

    async fn run_property(&self, property: &Property, months: &[TargetMonth]) -> PropertyOutcome {
        let room_types = match self.room_types(property) {
            Ok(room_types) => room_types,
            Err(e) => {
                warn!(property = %property.name, error = %e, "Skipping property");
                return PropertyOutcome {
                    failure: Some(TaskFailure::for_property(property, &e)),
                    ..Default::default()
                };
            }
        };

        let mut outcome = PropertyOutcome {
            room_types: room_types.len(),
            ..Default::default()
        };

        for (index, batch) in room_types
            .chunks(self.settings.room_concurrency)
            .enumerate()
        {
            if index > 0 && self.pause().await {
                outcome.cancelled = true;
                break;
            }

            let tasks = batch.iter().map(|room| self.run_room(property, room, months));
            outcome.tasks.extend(join_all(tasks).await);
        }

        outcome
    }

    fn room_types(&self, property: &Property) -> Result<Vec<RoomType>> {
        let room_types = self.catalog.active_room_types(property.id)?;
        validate_room_types(&room_types)?;
        Ok(room_types)
    }

    async fn run_room(
        &self,
        property: &Property,
        room: &RoomType,
        months: &[TargetMonth],
    ) -> TaskOutcome {
        let task = match ScrapeTask::new(property.clone(), room.clone(), months.to_vec()) {
            Ok(task) => task,
            Err(e) => return TaskOutcome::Failed(TaskFailure::for_room(property, room, &e, 0)),
        };

        let mut attempts = 0;
        let result = with_retry_if(
            &self.settings.retry,
            |attempt| {
                attempts = attempt + 1;
                self.attempt(&task, attempt)
            },
            Error::is_recoverable,
        )
        .await;

        match result {
            Ok(sync) => TaskOutcome::Synced(sync),
            Err(e) => {
                warn!(
                    property = %property.name,
                    room = %room.name,
                    attempts,
                    category = e.category().as_str(),
                    error = %e,
                    "Scrape task failed"
                );
                TaskOutcome::Failed(TaskFailure::for_room(property, room, &e, attempts))
            }
        }
    }

    /// One attempt: fresh session, scrape, close, synchronize.
    ///
    /// The synchronizer writes through a blocking SQLite connection, so it
    /// runs on the blocking pool.
    async fn attempt(&self, task: &ScrapeTask, attempt: u32) -> Result<SyncOutcome> {
        debug!(
            property = %task.property.name,
            room = %task.room_type.name,
            attempt = attempt + 1,
            "Starting scrape attempt"
        );

        let mut session = self.sessions.open(&task.property).await?;
        let scraped = self.runner.run(&mut *session, task).await;
        if let Err(e) = session.close().await {
            debug!(error = %e, "Failed to close calendar session");
        }

        let output = scraped?;
        let synchronizer = self.synchronizer.clone();
        let room_type_id = task.room_type.id;
        tokio::task::spawn_blocking(move || {
            synchronizer.sync(room_type_id, output.range, &output.days)
        })
        .await
        .map_err(|e| Error::with_source("synchronizer task failed", e))?
    }

    /// Sleep the politeness delay; true when a shutdown was requested
    async fn pause(&self) -> bool {
        let Some(shutdown) = &self.shutdown else {
            tokio::time::sleep(self.settings.batch_delay).await;
            return false;
        };

        if *shutdown.borrow() {
            return true;
        }

        let mut shutdown = shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.settings.batch_delay) => {}
            _ = shutdown.changed() => {}
        }

        let stop = *shutdown.borrow();
        if stop {
            info!("Shutdown requested, not starting further batches");
        }
        stop
    }
}
