mod commands;

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::RunParams;

#[derive(Parser)]
#[command(
    name = "calsync",
    version,
    about = "Booking calendar availability scraper",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configuration
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape availability for active properties
    Run {
        /// Target month, e.g. "September 2025" or "2025-09" (repeatable)
        #[arg(short, long = "month")]
        months: Vec<String>,

        /// Only properties whose name contains this text
        #[arg(short, long)]
        property: Option<String>,

        /// Keep running, starting a new run every N seconds
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Show stored availability of a room type
    Records {
        /// Room type id
        room_type_id: i64,

        /// First date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Print as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Show which ranges of a room type have been synchronized
    Coverage {
        /// Room type id
        room_type_id: i64,

        /// Explain what is known about a single date
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Manage the property catalog
    Properties {
        #[command(subcommand)]
        action: PropertyAction,
    },

    /// Validate and print the effective configuration
    CheckConfig,
}

#[derive(Subcommand)]
enum PropertyAction {
    /// List active properties and their room types
    List {
        /// Only properties whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Register a property
    Add {
        name: String,

        /// Reference substituted into the booking URL template
        #[arg(short, long)]
        reference: String,
    },

    /// Register a room type of a property
    AddRoom {
        property_id: i64,

        /// Value of the room's option in the booking widget
        #[arg(short, long)]
        external_id: String,

        #[arg(short, long)]
        name: String,

        #[arg(long, default_value = "2")]
        capacity: u32,
    },

    /// Stop scraping a property
    Deactivate { property_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref())?;

    // Initialize tracing/logging
    let log_format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(log_format, &config.logging.level, cli.verbose)?;

    match cli.command {
        Commands::Run {
            months,
            property,
            interval_secs,
        } => {
            tracing::info!(
                months = ?months,
                property = ?property,
                interval_secs = ?interval_secs,
                "Starting run command"
            );
            commands::run(
                config,
                RunParams {
                    months,
                    property,
                    interval_secs,
                },
            )
            .await?;
        }

        Commands::Records {
            room_type_id,
            from,
            to,
            json,
        } => {
            commands::records(&config, room_type_id, from, to, json)?;
        }

        Commands::Coverage { room_type_id, date } => {
            commands::coverage(&config, room_type_id, date)?;
        }

        Commands::Properties { action } => match action {
            PropertyAction::List { filter } => {
                commands::list_properties(&config, filter.as_deref())?;
            }
            PropertyAction::Add { name, reference } => {
                commands::add_property(&config, &name, &reference)?;
            }
            PropertyAction::AddRoom {
                property_id,
                external_id,
                name,
                capacity,
            } => {
                commands::add_room_type(&config, property_id, &external_id, &name, capacity)?;
            }
            PropertyAction::Deactivate { property_id } => {
                commands::deactivate_property(&config, property_id)?;
            }
        },

        Commands::CheckConfig => {
            commands::check_config(&config)?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("calsync=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("calsync={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
