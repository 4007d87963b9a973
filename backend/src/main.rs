//! Relay entry-point: loads settings, wires adapters and serves HTTP.

mod server;

use std::io;
use std::sync::Arc;

use actix_web::web;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use server::{ServerConfig, create_server};
use ortho_config::OrthoConfig;
use telemetry_relay::config::RelaySettings;
use telemetry_relay::domain::OAuthClient;
use telemetry_relay::inbound::http::health::HealthState;
use telemetry_relay::outbound::nest::NestHttpProvider;
use telemetry_relay::outbound::persistence::{DbPool, PoolConfig, run_migrations};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = RelaySettings::load()
        .map_err(|e| io::Error::other(format!("failed to load settings: {e}")))?;
    let config = server_config(&settings).await?;

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state, config)?;
    server.await
}

async fn server_config(settings: &RelaySettings) -> io::Result<ServerConfig> {
    let credentials = settings.client_credentials().map_err(io::Error::other)?;
    let client = OAuthClient {
        client_id: credentials.client_id.clone(),
        authorize_url: settings.authorize_url().map_err(io::Error::other)?,
    };
    let endpoints = settings.provider_endpoints().map_err(io::Error::other)?;
    let provider = NestHttpProvider::new(credentials, endpoints, settings.provider_timeout())
        .map_err(|e| io::Error::other(format!("failed to build provider client: {e}")))?;

    let config = ServerConfig::new(
        settings.bind_addr().map_err(io::Error::other)?,
        client,
        Arc::new(provider),
        settings.blob_root(),
    )
    .with_auditor(settings.auditor());

    let config = match settings.database_url() {
        Some(url) => {
            run_migrations(url).await.map_err(io::Error::other)?;
            let pool = DbPool::new(PoolConfig::new(url))
                .await
                .map_err(io::Error::other)?;
            info!(project = settings.project_id(), "using PostgreSQL document store");
            config.with_db_pool(pool, settings.project_id())
        }
        None => {
            warn!("no database configured; documents are kept in memory");
            config
        }
    };

    #[cfg(feature = "metrics")]
    let config = config.with_metrics(server::initialize_metrics());

    Ok(config)
}
