//! Calendar extraction
//!
//! Turns a booking widget into classified days:
//!
//! - [`session`] - driver boundary ([`CalendarSession`], [`SessionFactory`])
//! - [`classifier`] - pure cell → availability state mapping
//! - [`navigator`] - month-by-month date picker navigation
//! - [`task`] - one room type over a list of months
//! - [`browser`] - headless Chrome driver

pub mod browser;
pub mod classifier;
pub mod navigator;
pub mod session;
pub mod task;

pub use browser::BrowserSessionFactory;
pub use classifier::{Classification, Classifier};
pub use navigator::MonthWalker;
pub use session::{CalendarSession, SessionFactory};
pub use task::{MonthSummary, ScrapeOutput, ScrapeSummary, ScrapeTask, TaskRunner};
