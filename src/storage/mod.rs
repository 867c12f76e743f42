//! Persistence for the catalog and for scraped availability
//!
//! - [`repository`] - repository traits with SQLite and in-memory backends
//! - [`sync`] - the range-scoped synchronizer

pub mod repository;
pub mod sync;

pub use repository::{AvailabilityRepository, CatalogRepository, MockStore, SqliteStore};
pub use sync::{SyncOutcome, Synchronizer};
