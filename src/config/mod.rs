//! Configuration management for calsync
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::retry::RetryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Orchestration and retry settings
    pub scraper: ScraperConfig,

    /// Headless browser settings
    pub browser: BrowserConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Properties scraped at the same time
    pub property_concurrency: usize,

    /// Room types scraped at the same time within one property
    pub room_concurrency: usize,

    /// Politeness pause between batches, in milliseconds
    pub batch_delay_ms: u64,

    /// Retries per task after the first attempt
    pub max_retries: u32,

    /// Fixed pause between task attempts, in milliseconds
    pub retry_delay_ms: u64,

    /// Upper bound on month advances per target month
    pub max_month_steps: u32,

    /// Wait after each widget interaction, in milliseconds
    pub settle_delay_ms: u64,

    /// Months scraped when the caller gives none, starting with the current one
    pub months_ahead: usize,

    /// Tooltip phrases that mark a day as taken
    pub occupied_phrases: Vec<String>,
}

/// Headless Chrome settings and widget selectors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Booking page URL; `{reference}` is replaced by the property's booking reference
    pub booking_url_template: String,

    /// Run Chrome without a window
    pub headless: bool,

    /// Page load timeout in seconds
    pub page_timeout_secs: u64,

    /// Seconds Chrome may sit without any driver traffic before it shuts
    /// itself down; must outlast the longest pause between runs
    pub idle_timeout_secs: u64,

    /// `<select>` holding one option per room type
    pub room_select_selector: String,

    /// Element that opens the date picker
    pub calendar_trigger_selector: String,

    /// Element whose text is the displayed month label
    pub month_label_selector: String,

    /// "Next month" button
    pub next_month_selector: String,

    /// Day cells of the displayed month grid
    pub day_cell_selector: String,

    /// CSS classes mapped onto calendar cell markers
    pub markers: MarkerClasses,
}

/// CSS class names the widget uses for each cell marker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerClasses {
    pub other_month: String,
    pub start_blocked: String,
    pub end_blocked: String,
    pub disallowed: String,
    pub occupied_label: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,

    /// How long a writer waits on a locked database before giving up, in milliseconds
    pub busy_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            property_concurrency: 2,
            room_concurrency: 3,
            batch_delay_ms: 2_000,
            max_retries: 3,
            retry_delay_ms: 5_000,
            max_month_steps: 24,
            settle_delay_ms: 500,
            months_ahead: 3,
            occupied_phrases: vec![
                "occupied".to_string(),
                "booked".to_string(),
                "sold out".to_string(),
                "not available".to_string(),
            ],
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            booking_url_template: String::from("https://booking.example.com/{reference}"),
            headless: true,
            page_timeout_secs: 30,
            idle_timeout_secs: 3600,
            room_select_selector: String::from("select[name='room_type']"),
            calendar_trigger_selector: String::from("input[name='arrival']"),
            month_label_selector: String::from(".datepicker-month-label"),
            next_month_selector: String::from(".datepicker-next"),
            day_cell_selector: String::from(".datepicker-grid td[data-day]"),
            markers: MarkerClasses::default(),
        }
    }
}

impl Default for MarkerClasses {
    fn default() -> Self {
        Self {
            other_month: String::from("other-month"),
            start_blocked: String::from("start-blocked"),
            end_blocked: String::from("end-blocked"),
            disallowed: String::from("disallowed"),
            occupied_label: String::from("occupied"),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/availability.db"),
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Overlay `CALSYNC_*` environment variables onto this configuration
    pub fn apply_env(&mut self) {
        let scraper = &mut self.scraper;
        if let Some(v) = env_parse("CALSYNC_PROPERTY_CONCURRENCY") {
            scraper.property_concurrency = v;
        }
        if let Some(v) = env_parse("CALSYNC_ROOM_CONCURRENCY") {
            scraper.room_concurrency = v;
        }
        if let Some(v) = env_parse("CALSYNC_BATCH_DELAY_MS") {
            scraper.batch_delay_ms = v;
        }
        if let Some(v) = env_parse("CALSYNC_MAX_RETRIES") {
            scraper.max_retries = v;
        }
        if let Some(v) = env_parse("CALSYNC_RETRY_DELAY_MS") {
            scraper.retry_delay_ms = v;
        }
        if let Some(v) = env_parse("CALSYNC_MONTHS_AHEAD") {
            scraper.months_ahead = v;
        }

        if let Ok(template) = std::env::var("CALSYNC_BOOKING_URL") {
            self.browser.booking_url_template = template;
        }
        if let Some(v) = env_parse("CALSYNC_HEADLESS") {
            self.browser.headless = v;
        }
        if let Some(v) = env_parse("CALSYNC_IDLE_TIMEOUT_SECS") {
            self.browser.idle_timeout_secs = v;
        }

        if let Ok(path) = std::env::var("CALSYNC_SQLITE_PATH") {
            self.database.sqlite_path = path.into();
        }

        if let Ok(level) = std::env::var("CALSYNC_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CALSYNC_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scraper.property_concurrency == 0 {
            anyhow::bail!("property_concurrency must be greater than 0");
        }

        if self.scraper.room_concurrency == 0 {
            anyhow::bail!("room_concurrency must be greater than 0");
        }

        if self.scraper.max_month_steps == 0 {
            anyhow::bail!("max_month_steps must be greater than 0");
        }

        if self.scraper.months_ahead == 0 {
            anyhow::bail!("months_ahead must be greater than 0");
        }

        if self.browser.idle_timeout_secs == 0 {
            anyhow::bail!("idle_timeout_secs must be greater than 0");
        }

        if !self.browser.booking_url_template.contains("{reference}") {
            anyhow::bail!("booking_url_template must contain a {{reference}} placeholder");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be 'text' or 'json'");
        }

        Ok(())
    }

    /// Retry policy applied to each scrape task
    #[must_use]
    pub fn retry_policy(&self) -> RetryConfig {
        RetryConfig::fixed(self.scraper.max_retries, self.scraper.retry_delay_ms)
    }

    /// Get batch delay as Duration
    #[must_use]
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.scraper.batch_delay_ms)
    }

    /// Get settle delay as Duration
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.scraper.settle_delay_ms)
    }
}
