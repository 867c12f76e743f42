pub mod catalog;
pub mod records;
pub mod run;

// Re-export command functions for convenience
pub use catalog::{add_property, add_room_type, deactivate_property, list_properties};
pub use records::{coverage, records};
pub use run::{run, RunParams};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use calsync::config::Config;
use calsync::storage::SqliteStore;

/// Load the config file if one was given, otherwise the environment
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let mut config = Config::from_file(path)?;
            config.apply_env();
            config
        }
        None => Config::from_env()?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::new(
        &config.database.sqlite_path,
        Duration::from_millis(config.database.busy_timeout_ms),
    )
    .with_context(|| {
        format!(
            "Failed to open database: {}",
            config.database.sqlite_path.display()
        )
    })?;
    Ok(Arc::new(store))
}

/// Print the effective configuration
pub fn check_config(config: &Config) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("Configuration is valid.\n");
    println!("{rendered}");
    Ok(())
}
