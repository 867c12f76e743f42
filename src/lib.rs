//! calsync - booking calendar availability scraper
//!
//! Drives the date picker of a property's booking page, classifies every
//! rendered day into an availability state and keeps a local store of
//! check-in/check-out availability per room type in sync with what was seen.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Catalog, calendar and availability types
//! - [`scraper`] - Calendar session boundary, month walker, classifier and scrape tasks
//! - [`storage`] - Repositories (SQLite, in-memory) and the range-scoped synchronizer
//! - [`orchestrator`] - Batched, retried execution of scrape tasks over the catalog
//! - [`utils`] - Retry combinator and text helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use calsync::config::Config;
//! use calsync::models::TargetMonth;
//! use calsync::orchestrator::Orchestrator;
//! use calsync::scraper::BrowserSessionFactory;
//! use calsync::storage::SqliteStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = Arc::new(SqliteStore::new(
//!         &config.database.sqlite_path,
//!         std::time::Duration::from_millis(config.database.busy_timeout_ms),
//!     )?);
//!     let sessions = Arc::new(BrowserSessionFactory::launch(
//!         config.browser.clone(),
//!         config.settle_delay(),
//!     )?);
//!
//!     let orchestrator = Orchestrator::from_config(&config, store.clone(), store, sessions);
//!     let months = vec![TargetMonth::new(2025, 9)?];
//!     let report = orchestrator.run(&months, None).await?;
//!     println!("{} records written", report.records_written);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod scraper;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{
        AvailabilityDay, AvailabilityRecord, AvailabilityState, CalendarCell, Property, RoomType,
        ScrapeRange, TargetMonth,
    };
    pub use crate::orchestrator::{Orchestrator, RunReport, TaskFailure};
    pub use crate::scraper::{CalendarSession, SessionFactory};
    pub use crate::storage::{AvailabilityRepository, CatalogRepository, SqliteStore, Synchronizer};
}

// Direct re-exports for convenience
pub use models::{AvailabilityState, TargetMonth};
