use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use tokio::sync::watch;

use calsync::config::Config;
use calsync::models::TargetMonth;
use calsync::orchestrator::{Orchestrator, RunReport};
use calsync::scraper::BrowserSessionFactory;

use super::open_store;

pub struct RunParams {
    pub months: Vec<String>,
    pub property: Option<String>,
    pub interval_secs: Option<u64>,
}

pub async fn run(config: Config, params: RunParams) -> Result<()> {
    // Fail on bad --month values before Chrome starts
    target_months(&params.months, config.scraper.months_ahead, today())?;
    let store = open_store(&config)?;
    let sessions = BrowserSessionFactory::launch(config.browser.clone(), config.settle_delay())
        .context("Failed to start browser")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing the current batch");
            let _ = shutdown_tx.send(true);
        }
    });

    let orchestrator =
        Orchestrator::from_config(&config, store.clone(), store, Arc::new(sessions))
            .with_shutdown(shutdown_rx.clone());

    let Some(interval_secs) = params.interval_secs else {
        let months = resolve_months(&params, &config)?;
        let report = orchestrator
            .run(&months, params.property.as_deref())
            .await?;
        return print_report(&report);
    };

    let interval = Duration::from_secs(interval_secs);
    let mut shutdown = shutdown_rx;
    loop {
        // The default window follows the calendar across month boundaries
        let months = resolve_months(&params, &config)?;
        match orchestrator.run(&months, params.property.as_deref()).await {
            Ok(report) => print_report(&report)?,
            Err(e) => tracing::error!(error = %e, "Scrape run failed"),
        }

        if *shutdown.borrow() {
            break;
        }

        tracing::info!(next_in_secs = interval_secs, "Waiting for next run");
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => break,
        }
    }

    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn resolve_months(params: &RunParams, config: &Config) -> Result<Vec<TargetMonth>> {
    let months = target_months(&params.months, config.scraper.months_ahead, today())?;
    let labels: Vec<String> = months.iter().map(TargetMonth::label).collect();
    tracing::info!(months = ?labels, property = ?params.property, "Target months resolved");
    Ok(months)
}

/// Explicit months in calendar order, or `months_ahead` months starting
/// with the one containing `today`
fn target_months(
    raw: &[String],
    months_ahead: usize,
    today: NaiveDate,
) -> Result<Vec<TargetMonth>> {
    if raw.is_empty() {
        return Ok(TargetMonth::sequence(TargetMonth::containing(today), months_ahead));
    }

    let months = raw
        .iter()
        .map(|label| {
            label
                .parse::<TargetMonth>()
                .with_context(|| format!("Invalid month: {label}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(TargetMonth::ordered(&months))
}

fn print_report(report: &RunReport) -> Result<()> {
    for failure in &report.failures {
        tracing::warn!(
            property = %failure.property,
            room = failure.room.as_deref().unwrap_or("-"),
            category = %failure.category,
            reason = %failure.reason,
            "Task failure"
        );
    }
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
