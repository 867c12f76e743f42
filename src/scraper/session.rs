//! Automation driver boundary
//!
//! The scrape pipeline never touches markup. Everything it needs from a
//! booking widget goes through [`CalendarSession`], and every session is
//! opened by a [`SessionFactory`] so a retry can start from a clean page.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CalendarCell, Property};

/// One open booking page for a single property
///
/// Every method is a suspension point: implementations perform a widget
/// interaction and return once the driver acknowledged it.
#[async_trait]
pub trait CalendarSession: Send {
    /// Select the room type with this external identity
    ///
    /// Fails with `Error::RoomSelection` when no such option exists.
    async fn select_room(&mut self, external_id: &str) -> Result<()>;

    /// Open the date picker
    async fn open_calendar(&mut self) -> Result<()>;

    /// Label of the month currently rendered, e.g. "September 2025"
    async fn displayed_month_label(&mut self) -> Result<String>;

    /// Move the picker forward by one month
    async fn advance_month(&mut self) -> Result<()>;

    /// Every day cell currently rendered, filler cells included
    async fn calendar_cells(&mut self) -> Result<Vec<CalendarCell>>;

    /// Release driver resources
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens fresh sessions
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Open the booking page of `property`
    async fn open(&self, property: &Property) -> Result<Box<dyn CalendarSession>>;
}
