//! HTTP server configuration object and helpers.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use telemetry_relay::domain::ports::TelemetryProvider;
use telemetry_relay::domain::{AuditorConfig, OAuthClient};
use telemetry_relay::outbound::persistence::DbPool;

#[cfg(feature = "metrics")]
use actix_web_prom::PrometheusMetrics;

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) oauth_client: OAuthClient,
    pub(crate) provider: Arc<dyn TelemetryProvider>,
    pub(crate) blob_root: PathBuf,
    pub(crate) auditor: Option<AuditorConfig>,
    pub(crate) db_pool: Option<(DbPool, String)>,
    #[cfg(feature = "metrics")]
    pub(crate) prometheus: Option<PrometheusMetrics>,
}

impl ServerConfig {
    /// Construct a configuration backed by the in-memory store with the
    /// auditor disabled.
    #[must_use]
    pub fn new(
        bind_addr: SocketAddr,
        oauth_client: OAuthClient,
        provider: Arc<dyn TelemetryProvider>,
        blob_root: PathBuf,
    ) -> Self {
        Self {
            bind_addr,
            oauth_client,
            provider,
            blob_root,
            auditor: None,
            db_pool: None,
            #[cfg(feature = "metrics")]
            prometheus: None,
        }
    }

    /// Store documents in PostgreSQL under `project`.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool, project: impl Into<String>) -> Self {
        self.db_pool = Some((pool, project.into()));
        self
    }

    /// Spawn the periodic auditor alongside the server.
    #[must_use]
    pub fn with_auditor(mut self, auditor: AuditorConfig) -> Self {
        self.auditor = Some(auditor);
        self
    }

    #[cfg(feature = "metrics")]
    /// Attach Prometheus middleware to the configuration.
    #[must_use]
    pub fn with_metrics(mut self, prometheus: Option<PrometheusMetrics>) -> Self {
        self.prometheus = prometheus;
        self
    }
}
