//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain services and remain testable without I/O.

use std::sync::Arc;

use mockable::Clock;

use crate::domain::ports::{BlobStore, DocumentStore, TelemetryProvider};
use crate::domain::{ImageArchive, OAuthClient, OAuthLinker, TelemetryRelay};

/// Parameter object bundling the port implementations the services share.
#[derive(Clone)]
pub struct HttpStatePorts {
    pub store: Arc<dyn DocumentStore>,
    pub provider: Arc<dyn TelemetryProvider>,
    pub blobs: Arc<dyn BlobStore>,
    pub clock: Arc<dyn Clock>,
}

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub linker: Arc<OAuthLinker>,
    pub relay: Arc<TelemetryRelay>,
    pub images: Arc<ImageArchive>,
    /// Source of the instant each `/log` call is keyed under.
    pub clock: Arc<dyn Clock>,
}

impl HttpState {
    /// Wire the relay services over one set of ports.
    ///
    /// # Examples
    /// ```ignore
    /// use std::sync::Arc;
    ///
    /// use mockable::DefaultClock;
    /// use tempfile::TempDir;
    /// use telemetry_relay::domain::OAuthClient;
    /// use telemetry_relay::inbound::http::state::{HttpState, HttpStatePorts};
    /// use telemetry_relay::outbound::blob::CapStdBlobStore;
    /// use telemetry_relay::outbound::memory::InMemoryDocumentStore;
    /// use telemetry_relay::test_support::provider::ScriptedProvider;
    ///
    /// let temp = TempDir::new().expect("temp dir");
    /// let clock = Arc::new(DefaultClock);
    /// let ports = HttpStatePorts {
    ///     store: Arc::new(InMemoryDocumentStore::new(clock.clone())),
    ///     provider: Arc::new(ScriptedProvider::new()),
    ///     blobs: Arc::new(CapStdBlobStore::open(temp.path()).expect("blob root")),
    ///     clock,
    /// };
    /// let client = OAuthClient {
    ///     client_id: "relay".to_owned(),
    ///     authorize_url: "https://home.nest.com/login/oauth2".parse().expect("url"),
    /// };
    /// let state = HttpState::new(ports, client);
    /// let _relay = state.relay.clone();
    /// ```
    pub fn new(ports: HttpStatePorts, client: OAuthClient) -> Self {
        let HttpStatePorts {
            store,
            provider,
            blobs,
            clock,
        } = ports;
        Self {
            linker: Arc::new(OAuthLinker::new(store.clone(), provider.clone(), client)),
            relay: Arc::new(TelemetryRelay::new(store, provider)),
            images: Arc::new(ImageArchive::new(blobs, clock.clone())),
            clock,
        }
    }
}
