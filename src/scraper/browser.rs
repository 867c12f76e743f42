//! Headless Chrome implementation of the calendar session
//!
//! `headless_chrome` is a blocking client, so every interaction runs on the
//! blocking pool and the async caller only awaits the join handle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::error::{Error, Result};
use crate::models::{CalendarCell, Property};
use crate::scraper::session::{CalendarSession, SessionFactory};

/// Shares one Chrome process between sessions and opens a tab per session.
///
/// Chrome exits on its own after `idle_timeout_secs` without driver traffic,
/// so a failed `new_tab` relaunches the process once before giving up.
pub struct BrowserSessionFactory {
    browser: tokio::sync::Mutex<Arc<Browser>>,
    config: BrowserConfig,
    settle_delay: Duration,
}

impl BrowserSessionFactory {
    /// Launch headless Chrome
    pub fn launch(config: BrowserConfig, settle_delay: Duration) -> Result<Self> {
        let browser = start_browser(&config)?;

        Ok(Self {
            browser: tokio::sync::Mutex::new(Arc::new(browser)),
            config,
            settle_delay,
        })
    }

    fn booking_url(&self, property: &Property) -> String {
        self.config
            .booking_url_template
            .replace("{reference}", &property.booking_reference)
    }

    /// Replace `dead` with a fresh process unless another session already did
    async fn relaunch(&self, dead: &Arc<Browser>) -> Result<Arc<Browser>> {
        let mut current = self.browser.lock().await;
        if Arc::ptr_eq(&current, dead) {
            warn!("Chrome is not responding, relaunching");
            let config = self.config.clone();
            let browser = tokio::task::spawn_blocking(move || start_browser(&config))
                .await
                .map_err(|e| Error::with_source("browser launch task failed", e))??;
            *current = Arc::new(browser);
        }
        Ok(Arc::clone(&current))
    }
}

/// Launch options derived from the browser section of the configuration
fn launch_options(config: &BrowserConfig) -> Result<LaunchOptions<'static>> {
    LaunchOptions::default_builder()
        .headless(config.headless)
        .idle_browser_timeout(Duration::from_secs(config.idle_timeout_secs))
        .build()
        .map_err(|e| Error::automation(format!("Failed to build launch options: {e}")))
}

fn start_browser(config: &BrowserConfig) -> Result<Browser> {
    info!(
        headless = config.headless,
        idle_timeout_secs = config.idle_timeout_secs,
        "Launching Chrome..."
    );

    Browser::new(launch_options(config)?)
        .map_err(|e| Error::automation(format!("Failed to launch Chrome browser: {e}")))
}

async fn new_tab(browser: Arc<Browser>) -> Result<Arc<Tab>> {
    blocking(move || browser.new_tab()).await
}

#[async_trait]
impl SessionFactory for BrowserSessionFactory {
    async fn open(&self, property: &Property) -> Result<Box<dyn CalendarSession>> {
        let url = self.booking_url(property);
        let timeout = Duration::from_secs(self.config.page_timeout_secs);

        debug!(property = %property.name, url = %url, "Opening booking page");

        let browser = Arc::clone(&*self.browser.lock().await);
        let tab = match new_tab(Arc::clone(&browser)).await {
            Ok(tab) => tab,
            Err(e) => {
                debug!(error = %e, "Failed to open a tab");
                new_tab(self.relaunch(&browser).await?).await?
            }
        };

        let page = Arc::clone(&tab);
        blocking(move || {
            page.set_default_timeout(timeout);
            page.navigate_to(&url)?;
            page.wait_until_navigated()?;
            Ok(())
        })
        .await?;

        tokio::time::sleep(self.settle_delay).await;

        Ok(Box::new(BrowserCalendarSession {
            tab,
            config: self.config.clone(),
            settle_delay: self.settle_delay,
        }))
    }
}

/// One booking page tab
pub struct BrowserCalendarSession {
    tab: Arc<Tab>,
    config: BrowserConfig,
    settle_delay: Duration,
}

/// Cell as serialized by the extraction script
#[derive(Debug, Deserialize)]
struct RawCell {
    day: Option<u32>,
    classes: Vec<String>,
    tooltip: Option<String>,
}

impl BrowserCalendarSession {
    async fn evaluate(&self, script: String) -> Result<Value> {
        let tab = Arc::clone(&self.tab);
        blocking(move || Ok(tab.evaluate(&script, false)?.value.unwrap_or(Value::Null))).await
    }

    async fn click(&self, selector: &str) -> Result<bool> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el) return false; el.click(); return true; }})()",
            sel = json!(selector)
        );
        Ok(self.evaluate(script).await?.as_bool().unwrap_or(false))
    }

    async fn settle(&self) {
        tokio::time::sleep(self.settle_delay).await;
    }

    fn to_cell(&self, raw: RawCell) -> Option<CalendarCell> {
        let markers = &self.config.markers;
        let has = |class: &str| raw.classes.iter().any(|c| c == class);

        Some(CalendarCell {
            day: raw.day?,
            in_displayed_month: !has(&markers.other_month),
            start_blocked: has(&markers.start_blocked),
            end_blocked: has(&markers.end_blocked),
            disallowed: has(&markers.disallowed),
            occupied_label: has(&markers.occupied_label),
            tooltip: raw.tooltip.filter(|t| !t.trim().is_empty()),
        })
    }
}

#[async_trait]
impl CalendarSession for BrowserCalendarSession {
    async fn select_room(&mut self, external_id: &str) -> Result<()> {
        let script = format!(
            r#"(() => {{
                const select = document.querySelector({sel});
                if (!select) return "no-select";
                const option = Array.from(select.options).find(o => o.value === {id});
                if (!option) return "no-option";
                select.value = option.value;
                select.dispatchEvent(new Event("change", {{ bubbles: true }}));
                return "ok";
            }})()"#,
            sel = json!(self.config.room_select_selector),
            id = json!(external_id)
        );

        match self.evaluate(script).await?.as_str() {
            Some("ok") => {
                self.settle().await;
                Ok(())
            }
            Some("no-option") => Err(Error::RoomSelection {
                external_id: external_id.to_string(),
            }),
            other => Err(Error::automation(format!(
                "room selector '{}' not found ({other:?})",
                self.config.room_select_selector
            ))),
        }
    }

    async fn open_calendar(&mut self) -> Result<()> {
        if !self.click(&self.config.calendar_trigger_selector).await? {
            return Err(Error::automation(format!(
                "calendar trigger '{}' not found",
                self.config.calendar_trigger_selector
            )));
        }
        self.settle().await;
        Ok(())
    }

    async fn displayed_month_label(&mut self) -> Result<String> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); return el ? el.textContent : null; }})()",
            sel = json!(self.config.month_label_selector)
        );

        self.evaluate(script)
            .await?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                Error::automation(format!(
                    "month label '{}' not found",
                    self.config.month_label_selector
                ))
            })
    }

    async fn advance_month(&mut self) -> Result<()> {
        if !self.click(&self.config.next_month_selector).await? {
            return Err(Error::automation(format!(
                "next month button '{}' not found",
                self.config.next_month_selector
            )));
        }
        Ok(())
    }

    async fn calendar_cells(&mut self) -> Result<Vec<CalendarCell>> {
        let script = format!(
            r#"JSON.stringify(Array.from(document.querySelectorAll({sel})).map(el => {{
                const raw = el.getAttribute("data-day") || el.textContent;
                const day = parseInt(raw, 10);
                return {{
                    day: Number.isNaN(day) ? null : day,
                    classes: Array.from(el.classList),
                    tooltip: el.getAttribute("title") || el.getAttribute("data-tooltip"),
                }};
            }}))"#,
            sel = json!(self.config.day_cell_selector)
        );

        let value = self.evaluate(script).await?;
        let payload = value
            .as_str()
            .ok_or_else(|| Error::automation("cell extraction returned no data"))?;
        let raw: Vec<RawCell> = serde_json::from_str(payload)?;

        let cells: Vec<CalendarCell> = raw.into_iter().filter_map(|r| self.to_cell(r)).collect();
        debug!(cells = cells.len(), "Read calendar cells");
        Ok(cells)
    }

    async fn close(&mut self) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        blocking(move || tab.close(false).map(|_| ())).await
    }
}

/// Run a blocking driver call off the async runtime
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::automation(format!("driver task failed: {e}")))?
        .map_err(|e| Error::automation(e.to_string()))
}
