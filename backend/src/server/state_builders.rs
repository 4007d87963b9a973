//! Builders selecting adapters for the HTTP state and the auditor.

use std::sync::Arc;

use actix_web::web;
use mockable::{Clock, DefaultClock};

use telemetry_relay::domain::ports::{CheckupMetrics, DocumentStore, NoOpCheckupMetrics};
use telemetry_relay::domain::{AuditorConfig, PeriodicAuditor, TelemetryRelay, TokioSleeper};
use telemetry_relay::inbound::http::state::{HttpState, HttpStatePorts};
use telemetry_relay::outbound::blob::CapStdBlobStore;
use telemetry_relay::outbound::memory::InMemoryDocumentStore;
#[cfg(feature = "metrics")]
use telemetry_relay::outbound::metrics::PrometheusCheckupMetrics;
use telemetry_relay::outbound::persistence::DieselDocumentStore;

use super::ServerConfig;

/// Use PostgreSQL when a pool is configured, otherwise a process-local
/// store that forgets everything on restart.
pub(super) fn build_document_store(
    config: &ServerConfig,
    clock: Arc<dyn Clock>,
) -> Arc<dyn DocumentStore> {
    match &config.db_pool {
        Some((pool, project)) => Arc::new(DieselDocumentStore::new(pool.clone(), project.clone())),
        None => Arc::new(InMemoryDocumentStore::new(clock)),
    }
}

/// Build the shared HTTP state over `store`.
///
/// # Errors
///
/// Returns the I/O error when the blob root cannot be created.
pub(super) fn build_http_state(
    config: &ServerConfig,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
) -> std::io::Result<web::Data<HttpState>> {
    let blobs = CapStdBlobStore::open(&config.blob_root)?;
    Ok(web::Data::new(HttpState::new(
        HttpStatePorts {
            store,
            provider: config.provider.clone(),
            blobs: Arc::new(blobs),
            clock,
        },
        config.oauth_client.clone(),
    )))
}

/// Register checkup gauges when Prometheus is configured.
///
/// # Errors
///
/// Returns [`std::io::Error`] if metric registration fails.
#[cfg(feature = "metrics")]
fn build_checkup_metrics(config: &ServerConfig) -> std::io::Result<Arc<dyn CheckupMetrics>> {
    match &config.prometheus {
        Some(prom) => {
            let metrics = PrometheusCheckupMetrics::new(&prom.registry).map_err(|e| {
                std::io::Error::other(format!("checkup metrics registration failed: {e}"))
            })?;
            Ok(Arc::new(metrics))
        }
        None => Ok(Arc::new(NoOpCheckupMetrics)),
    }
}

#[cfg(not(feature = "metrics"))]
fn build_checkup_metrics(_config: &ServerConfig) -> std::io::Result<Arc<dyn CheckupMetrics>> {
    Ok(Arc::new(NoOpCheckupMetrics))
}

/// Build the auditor over the same store the handlers use.
///
/// # Errors
///
/// Propagates metric registration failures.
pub(super) fn build_auditor(
    config: &ServerConfig,
    auditor: AuditorConfig,
    store: Arc<dyn DocumentStore>,
) -> std::io::Result<PeriodicAuditor> {
    let metrics = build_checkup_metrics(config)?;
    Ok(PeriodicAuditor::new(
        TelemetryRelay::new(store, config.provider.clone()),
        metrics,
        Arc::new(DefaultClock),
        Arc::new(TokioSleeper),
        auditor,
    ))
}
