//! Month navigation
//!
//! Date pickers only move one month per click and re-render asynchronously,
//! so the walker clicks, waits for the widget to settle, and re-reads the
//! label until it shows the target month.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::TargetMonth;
use crate::scraper::session::CalendarSession;

/// Default bound on advances: two years ahead
pub const DEFAULT_MAX_STEPS: u32 = 24;

/// Drives a date picker forward to a target month
#[derive(Debug, Clone)]
pub struct MonthWalker {
    max_steps: u32,
    settle_delay: Duration,
}

impl Default for MonthWalker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEPS, Duration::from_millis(500))
    }
}

impl MonthWalker {
    pub fn new(max_steps: u32, settle_delay: Duration) -> Self {
        Self {
            max_steps,
            settle_delay,
        }
    }

    /// Advance until `target` is displayed; returns the number of advances
    ///
    /// Fails with `Error::NavigationExhausted` after `max_steps` advances
    /// without a match. Never retries on its own.
    pub async fn walk_to(
        &self,
        session: &mut dyn CalendarSession,
        target: TargetMonth,
    ) -> Result<u32> {
        let mut steps = 0;

        loop {
            let displayed = session.displayed_month_label().await?;
            if target.matches_label(&displayed) {
                tracing::debug!(target = %target, steps, "Reached target month");
                return Ok(steps);
            }

            if steps >= self.max_steps {
                return Err(Error::NavigationExhausted {
                    target: target.label(),
                    steps,
                    last_seen: displayed,
                });
            }

            tracing::trace!(displayed = %displayed, target = %target, "Advancing calendar");
            session.advance_month().await?;
            if !self.settle_delay.is_zero() {
                tokio::time::sleep(self.settle_delay).await;
            }
            steps += 1;
        }
    }
}
