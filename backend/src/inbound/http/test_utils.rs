//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_web::dev::ServiceResponse;
use actix_web::test;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use crate::domain::ports::TelemetrySnapshot;
use crate::domain::{Document, OAuthClient, Value};
use crate::inbound::http::state::{HttpState, HttpStatePorts};
use crate::outbound::blob::CapStdBlobStore;
use crate::outbound::memory::InMemoryDocumentStore;
use crate::test_support::MutableClock;
use crate::test_support::provider::ScriptedProvider;

/// Handler state plus handles on every port for assertions.
pub struct TestHarness {
    pub state: HttpState,
    pub store: Arc<InMemoryDocumentStore>,
    pub provider: Arc<ScriptedProvider>,
    pub clock: Arc<MutableClock>,
    pub blob_root: TempDir,
}

/// Instant the harness clock starts at.
pub fn harness_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 7, 9, 30, 0)
        .single()
        .expect("valid instant")
}

/// Build handler state over the in-memory store and a temp blob root.
pub fn harness(provider: ScriptedProvider) -> TestHarness {
    let clock = Arc::new(MutableClock::new(harness_start()));
    let store = Arc::new(InMemoryDocumentStore::new(clock.clone()));
    let provider = Arc::new(provider);
    let blob_root = TempDir::new().expect("temp dir");
    let blobs = CapStdBlobStore::open(blob_root.path()).expect("blob root");
    let client = OAuthClient {
        client_id: "relay-client".to_owned(),
        authorize_url: "https://home.nest.com/login/oauth2"
            .parse()
            .expect("authorize url"),
    };
    let state = HttpState::new(
        HttpStatePorts {
            store: store.clone(),
            provider: provider.clone(),
            blobs: Arc::new(blobs),
            clock: clock.clone(),
        },
        client,
    );
    TestHarness {
        state,
        store,
        provider,
        clock,
        blob_root,
    }
}

/// Snapshot with a single named thermostat keyed by its name.
pub fn one_thermostat(user_id: &str, access_token: &str, device: &str) -> TelemetrySnapshot {
    let attributes = Document::from([
        ("name".to_owned(), Value::from(device)),
        ("humidity".to_owned(), Value::Integer(42)),
    ]);
    TelemetrySnapshot {
        user_id: user_id.to_owned(),
        access_token: access_token.to_owned(),
        thermostats: [(device.to_owned(), attributes)].into(),
    }
}

/// Read a response body as UTF-8 text.
pub async fn body_text(res: ServiceResponse) -> String {
    let bytes = test::read_body(res).await;
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}
