//! Run one checkup pass against the configured store and exit.
//!
//! Exits non-zero when a device is stale or timestamps cannot be read, so
//! the binary can back an external cron or alerting job.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::sync::Arc;

use color_eyre::eyre::{Context, Result, eyre};
use ortho_config::OrthoConfig;
use mockable::DefaultClock;
use tokio::runtime::Builder;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use telemetry_relay::config::RelaySettings;
use telemetry_relay::domain::ports::NoOpCheckupMetrics;
use telemetry_relay::domain::{CheckupReport, PeriodicAuditor, TelemetryRelay, TokioSleeper};
use telemetry_relay::outbound::nest::NestHttpProvider;
use telemetry_relay::outbound::persistence::{DbPool, DieselDocumentStore, PoolConfig};

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init();

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to create Tokio runtime")?;
    let report = runtime.block_on(run_once())?;
    verdict(&report)
}

async fn run_once() -> Result<CheckupReport> {
    let settings =
        RelaySettings::load().map_err(|e| eyre!("failed to load settings: {e}"))?;
    let database_url = settings
        .database_url()
        .ok_or_else(|| eyre!("RELAY_DATABASE_URL is required for a checkup"))?;
    let pool = DbPool::new(PoolConfig::new(database_url))
        .await
        .wrap_err("failed to create database pool")?;
    let store = Arc::new(DieselDocumentStore::new(pool, settings.project_id()));

    let provider = NestHttpProvider::new(
        settings.client_credentials()?,
        settings.provider_endpoints()?,
        settings.provider_timeout(),
    )
    .wrap_err("failed to build provider client")?;

    let auditor = PeriodicAuditor::new(
        TelemetryRelay::new(store, Arc::new(provider)),
        Arc::new(NoOpCheckupMetrics),
        Arc::new(DefaultClock),
        Arc::new(TokioSleeper),
        settings.auditor(),
    );
    Ok(auditor.tick().await)
}

fn verdict(report: &CheckupReport) -> Result<()> {
    if !report.timestamps_read {
        return Err(eyre!("device timestamps could not be read"));
    }
    if !report.stale.is_empty() {
        let names: Vec<&str> = report.stale.iter().map(|device| device.name.as_str()).collect();
        return Err(eyre!("stale devices: {}", names.join(", ")));
    }
    info!(relayed = ?report.relayed, "all devices fresh");
    Ok(())
}
