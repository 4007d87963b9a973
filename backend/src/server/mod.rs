//! Server construction and middleware wiring.

mod config;
#[cfg(feature = "metrics")]
mod metrics;
mod state_builders;

pub use config::ServerConfig;
#[cfg(feature = "metrics")]
pub use metrics::initialize_metrics;

#[cfg(feature = "metrics")]
use metrics::MetricsLayer;
use state_builders::{build_auditor, build_document_store, build_http_state};

use std::sync::Arc;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use mockable::{Clock, DefaultClock};
use tracing::info;

use telemetry_relay::Trace;
use telemetry_relay::inbound::http::health::{HealthState, live, ready};
use telemetry_relay::inbound::http::images::upload_image;
use telemetry_relay::inbound::http::oauth::{login, oauth_callback};
use telemetry_relay::inbound::http::state::HttpState;
use telemetry_relay::inbound::http::telemetry::post_log;

fn build_app(
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(health_state)
        .app_data(http_state)
        .wrap(Trace)
        .service(login)
        .service(oauth_callback)
        .service(post_log)
        .service(upload_image)
        .service(ready)
        .service(live)
}

/// Construct the HTTP server and, when configured, spawn the auditor.
///
/// The auditor shares the handlers' document store so it sees every write.
///
/// # Errors
/// Propagates [`std::io::Error`] when the blob root cannot be opened,
/// metric registration fails, or the socket cannot be bound.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let store = build_document_store(&config, clock.clone());
    let http_state = build_http_state(&config, store.clone(), clock)?;
    let auditor = config
        .auditor
        .clone()
        .map(|auditor| build_auditor(&config, auditor, store))
        .transpose()?;

    #[cfg(feature = "metrics")]
    let metrics_layer = MetricsLayer::from_option(config.prometheus);

    let server_health_state = health_state.clone();
    let server = HttpServer::new(move || {
        let app = build_app(server_health_state.clone(), http_state.clone());

        #[cfg(feature = "metrics")]
        let app = app.wrap(metrics_layer.clone());

        app
    })
    .bind(config.bind_addr)?
    .run();

    if let Some(auditor) = auditor {
        info!(
            interval_seconds = auditor.config().interval.as_secs(),
            "starting checkup loop"
        );
        actix_web::rt::spawn(async move { auditor.run_forever().await });
    }

    health_state.mark_ready();
    Ok(server)
}
