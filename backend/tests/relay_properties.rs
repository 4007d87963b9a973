//! Properties of the linking and relay services against the in-memory store.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use mockable::Clock;
use rstest::{fixture, rstest};
use telemetry_relay::domain::ports::{DocumentStore, TelemetrySnapshot};
use telemetry_relay::domain::{
    CollectionPath, Document, DocumentPath, LinkError, OAuthClient, OAuthLinker, RelayError,
    StateTokenError, TelemetryRelay, Value, log_key_for,
};
use telemetry_relay::outbound::memory::InMemoryDocumentStore;
use telemetry_relay::test_support::MutableClock;
use telemetry_relay::test_support::provider::ScriptedProvider;
use telemetry_relay::test_support::store::FailingWrites;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 7, 9, 30, 0)
        .single()
        .expect("valid instant")
}

fn client() -> OAuthClient {
    OAuthClient {
        client_id: "relay-client".to_owned(),
        authorize_url: "https://home.nest.com/login/oauth2"
            .parse()
            .expect("authorize url"),
    }
}

fn thermostat(name: &str) -> Document {
    Document::from([
        ("name".to_owned(), Value::from(name)),
        ("humidity".to_owned(), Value::Integer(40)),
    ])
}

fn snapshot(user_id: &str, token: &str, devices: &[(&str, &str)]) -> TelemetrySnapshot {
    TelemetrySnapshot {
        user_id: user_id.to_owned(),
        access_token: token.to_owned(),
        thermostats: devices
            .iter()
            .map(|(id, name)| ((*id).to_owned(), thermostat(name)))
            .collect(),
    }
}

fn doc(collection: &str, id: &str) -> DocumentPath {
    CollectionPath::root(collection)
        .and_then(|path| path.doc(id))
        .expect("document path")
}

fn log_collection(device: &str) -> CollectionPath {
    doc("device", device)
        .collection("log")
        .expect("log collection")
}

struct World {
    clock: Arc<MutableClock>,
    store: Arc<InMemoryDocumentStore>,
}

#[fixture]
fn world() -> World {
    let clock = Arc::new(MutableClock::new(start()));
    let store = Arc::new(InMemoryDocumentStore::new(clock.clone()));
    World { clock, store }
}

fn state_of(url: &str) -> String {
    url::Url::parse(url)
        .expect("authorize url")
        .query_pairs()
        .find(|(name, _)| name == "state")
        .map(|(_, value)| value.into_owned())
        .expect("state parameter")
}

#[rstest]
#[tokio::test]
async fn state_tokens_are_single_use(world: World) {
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_grant("code-1", "token-1")
            .with_snapshot("token-1", snapshot("user-1", "token-1", &[])),
    );
    let linker = OAuthLinker::new(world.store.clone(), provider.clone(), client());
    let state = state_of(&linker.begin_login().await.expect("begin"));

    linker
        .complete_login(Some("code-1"), Some(&state))
        .await
        .expect("first callback links");
    let replay = linker
        .complete_login(Some("code-1"), Some(&state))
        .await
        .expect_err("replay refused");

    assert_eq!(replay, LinkError::State(StateTokenError::AlreadyUsed));
    assert_eq!(provider.exchange_calls(), 1);
}

#[rstest]
#[tokio::test]
async fn unknown_state_never_exchanges_the_code(world: World) {
    let provider = Arc::new(ScriptedProvider::new().with_grant("code-1", "token-1"));
    let linker = OAuthLinker::new(world.store.clone(), provider.clone(), client());

    let error = linker
        .complete_login(Some("code-1"), Some("forged"))
        .await
        .expect_err("forged state refused");

    assert_eq!(error, LinkError::State(StateTokenError::NotFound));
    assert_eq!(provider.exchange_calls(), 0);
    assert_eq!(provider.fetch_calls(), 0);
}

#[rstest]
#[case::no_code(None, Some("state"))]
#[case::no_state(Some("code"), None)]
#[case::both_empty(Some(""), Some(""))]
#[tokio::test]
async fn missing_parameters_touch_no_port(
    world: World,
    #[case] code: Option<&str>,
    #[case] state: Option<&str>,
) {
    let store = Arc::new(FailingWrites::new(world.store.clone()));
    let provider = Arc::new(ScriptedProvider::new());
    let linker = OAuthLinker::new(store.clone(), provider.clone(), client());

    let error = linker
        .complete_login(code, state)
        .await
        .expect_err("parameters required");

    assert_eq!(error, LinkError::MissingParameters);
    assert_eq!(store.calls(), 0);
    assert_eq!(provider.exchange_calls(), 0);
}

#[rstest]
#[tokio::test]
async fn linking_writes_account_and_thermostats_but_no_devices(world: World) {
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_grant("code-1", "token-1")
            .with_snapshot("token-1", snapshot("user-1", "token-1", &[("dev-1", "Hall")])),
    );
    let linker = OAuthLinker::new(world.store.clone(), provider, client());
    let state = state_of(&linker.begin_login().await.expect("begin"));

    let linked = linker
        .complete_login(Some("code-1"), Some(&state))
        .await
        .expect("link");

    assert_eq!(linked.user_id, "user-1");
    assert_eq!(linked.thermostat_ids, vec!["dev-1".to_owned()]);
    let thermostat_path = doc("user", "user-1")
        .collection("thermostat")
        .and_then(|path| path.doc("dev-1"))
        .expect("thermostat path");
    let stored = world
        .store
        .get(&thermostat_path)
        .await
        .expect("read")
        .expect("thermostat stored");
    assert_eq!(stored.get("name"), Some(&Value::from("Hall")));
    let devices = world
        .store
        .list(&CollectionPath::root("device").expect("collection"))
        .await
        .expect("list");
    assert!(devices.is_empty());
}

#[rstest]
#[tokio::test]
async fn local_payload_timestamp_is_the_write_time(world: World) {
    let relay = TelemetryRelay::new(world.store.clone(), Arc::new(ScriptedProvider::new()));
    let log_key = log_key_for(start());
    world.clock.advance_seconds(90);

    relay
        .relay_local_payload(&log_key, Document::from([("battery".to_owned(), Value::Double(3.9))]))
        .await
        .expect("relay");

    let timestamps = relay.get_most_recent_timestamps().await.expect("timestamps");
    assert_eq!(timestamps.get("feather"), Some(&(start() + chrono::Duration::seconds(90))));
    let entry = world
        .store
        .get(&log_collection("feather").doc(&log_key).expect("log path"))
        .await
        .expect("read")
        .expect("log entry");
    assert_eq!(
        entry.get("timestamp").and_then(Value::as_timestamp),
        Some(start() + chrono::Duration::seconds(90))
    );
}

#[rstest]
#[tokio::test]
async fn same_log_key_overwrites_and_distinct_keys_append(world: World) {
    let relay = TelemetryRelay::new(world.store.clone(), Arc::new(ScriptedProvider::new()));
    let first_key = log_key_for(start());
    let payload =
        |battery: f64| Document::from([("battery".to_owned(), Value::Double(battery))]);

    relay
        .relay_local_payload(&first_key, payload(3.9))
        .await
        .expect("first");
    relay
        .relay_local_payload(&first_key, payload(3.8))
        .await
        .expect("overwrite");
    world.clock.advance_seconds(1);
    let second_key = log_key_for(world.clock.utc());
    relay
        .relay_local_payload(&second_key, payload(3.7))
        .await
        .expect("append");

    let entries = world
        .store
        .list(&log_collection("feather"))
        .await
        .expect("list log");
    let keys: Vec<&str> = entries.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(keys, vec!["2024-03-07T09:30:00Z", "2024-03-07T09:30:01Z"]);
    assert_eq!(entries[0].1.get("battery"), Some(&Value::Double(3.8)));
}

#[rstest]
#[tokio::test]
async fn unreadable_timestamp_yields_no_partial_mapping(world: World) {
    let relay = TelemetryRelay::new(world.store.clone(), Arc::new(ScriptedProvider::new()));
    relay
        .relay_local_payload(&log_key_for(start()), Document::new())
        .await
        .expect("relay");
    world
        .store
        .set(
            &doc("device", "Attic"),
            Document::from([("timestamp".to_owned(), Value::from("yesterday"))]),
        )
        .await
        .expect("seed broken device");

    let error = relay
        .get_most_recent_timestamps()
        .await
        .expect_err("invalid timestamp");

    assert!(matches!(error, RelayError::InvalidData { .. }));
}

#[rstest]
#[tokio::test]
async fn fan_out_aborts_on_first_failed_write(world: World) {
    world
        .store
        .set(
            &doc("user", "user-1"),
            Document::from([("access_token".to_owned(), Value::from("token-1"))]),
        )
        .await
        .expect("seed account");
    let provider = Arc::new(ScriptedProvider::new().with_snapshot(
        "token-1",
        snapshot("user-1", "token-1", &[("dev-a", "Attic"), ("dev-b", "Basement")]),
    ));
    let store = Arc::new(FailingWrites::new(world.store.clone()).failing_under("device/Attic/log"));
    let relay = TelemetryRelay::new(store, provider);

    let error = relay
        .relay_external_snapshot(&log_key_for(start()))
        .await
        .expect_err("log write fails");

    assert!(matches!(error, RelayError::Store { .. }));
    let written: Vec<String> = world
        .store
        .list(&CollectionPath::root("device").expect("collection"))
        .await
        .expect("list")
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(written, vec!["Attic".to_owned()]);
}
