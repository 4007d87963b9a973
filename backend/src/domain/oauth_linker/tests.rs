//! OAuth linker behaviour against mocked ports.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use mockall::predicate::eq;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ErrorCode;
use crate::domain::ports::{
    AccessGrant, ConditionalWrite, DocumentStoreError, MockDocumentStore, MockTelemetryProvider,
};

#[fixture]
fn client() -> OAuthClient {
    OAuthClient {
        client_id: "client-123".to_owned(),
        authorize_url: Url::parse("https://home.nest.com/login/oauth2").expect("valid url"),
    }
}

fn hall_snapshot() -> TelemetrySnapshot {
    TelemetrySnapshot {
        user_id: "user-9".to_owned(),
        access_token: "c.token".to_owned(),
        thermostats: BTreeMap::from([(
            "Hall".to_owned(),
            Document::from([
                ("name".to_owned(), Value::from("Hall")),
                ("humidity".to_owned(), Value::Integer(42)),
            ]),
        )]),
    }
}

fn provider_with_snapshot(snapshot: TelemetrySnapshot) -> MockTelemetryProvider {
    let mut provider = MockTelemetryProvider::new();
    provider
        .expect_exchange_code()
        .with(eq("abc"))
        .times(1)
        .returning(|_| {
            Ok(AccessGrant {
                access_token: "c.token".to_owned(),
                expires_in: 315_360_000,
            })
        });
    provider
        .expect_fetch_snapshot()
        .with(eq("c.token"))
        .times(1)
        .returning(move |_| Ok(snapshot.clone()));
    provider
}

#[rstest]
#[tokio::test]
async fn begin_login_embeds_client_id_and_state(client: OAuthClient) {
    let mut store = MockDocumentStore::new();
    store
        .expect_add()
        .times(1)
        .returning(|_, _| Ok("state-1".to_owned()));
    let linker = OAuthLinker::new(
        Arc::new(store),
        Arc::new(MockTelemetryProvider::new()),
        client,
    );

    let url = linker.begin_login().await.expect("redirect url");

    assert_eq!(
        url,
        "https://home.nest.com/login/oauth2?client_id=client-123&state=state-1"
    );
}

#[rstest]
#[case::missing_code(None, Some("state-1"))]
#[case::missing_state(Some("abc"), None)]
#[case::empty_code(Some(""), Some("state-1"))]
#[case::both_missing(None, None)]
#[tokio::test]
async fn missing_parameters_fail_before_store_access(
    client: OAuthClient,
    #[case] code: Option<&'static str>,
    #[case] state: Option<&'static str>,
) {
    let mut store = MockDocumentStore::new();
    store.expect_update_if().never();
    store.expect_set().never();
    store.expect_get().never();
    let mut provider = MockTelemetryProvider::new();
    provider.expect_exchange_code().never();
    let linker = OAuthLinker::new(Arc::new(store), Arc::new(provider), client);

    let error = linker
        .complete_login(code, state)
        .await
        .expect_err("parameters are missing");

    assert_eq!(error, LinkError::MissingParameters);
    assert_eq!(Error::from(error).code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[case::unknown(ConditionalWrite::Missing)]
#[case::replayed(ConditionalWrite::PreconditionFailed)]
#[tokio::test]
async fn rejected_state_never_reaches_provider(client: OAuthClient, #[case] outcome: ConditionalWrite) {
    let mut store = MockDocumentStore::new();
    store
        .expect_update_if()
        .times(1)
        .returning(move |_, _, _| Ok(outcome));
    store.expect_set().never();
    let mut provider = MockTelemetryProvider::new();
    provider.expect_exchange_code().never();
    provider.expect_fetch_snapshot().never();
    let linker = OAuthLinker::new(Arc::new(store), Arc::new(provider), client);

    let error = linker
        .complete_login(Some("abc"), Some("state-1"))
        .await
        .expect_err("state is not consumable");

    assert!(matches!(error, LinkError::State(_)));
    assert_eq!(Error::from(error).code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn successful_link_writes_account_then_thermostats_only(client: OAuthClient) {
    let writes = Arc::new(Mutex::new(Vec::<String>::new()));
    let recorded = writes.clone();
    let mut store = MockDocumentStore::new();
    store
        .expect_update_if()
        .times(1)
        .returning(|_, _, _| Ok(ConditionalWrite::Applied));
    store.expect_set().times(2).returning(move |path, document| {
        recorded
            .lock()
            .expect("writes lock")
            .push(format!("{path}:{}", document.len()));
        Ok(())
    });
    let linker = OAuthLinker::new(
        Arc::new(store),
        Arc::new(provider_with_snapshot(hall_snapshot())),
        client,
    );

    let linked = linker
        .complete_login(Some("abc"), Some("state-1"))
        .await
        .expect("link succeeds");

    assert_eq!(linked.user_id, "user-9");
    assert_eq!(linked.thermostat_ids, vec!["Hall".to_owned()]);
    assert_eq!(
        *writes.lock().expect("writes lock"),
        vec![
            "user/user-9:1".to_owned(),
            "user/user-9/thermostat/Hall:2".to_owned()
        ]
    );
}

#[rstest]
#[tokio::test]
async fn rejected_code_maps_to_forbidden(client: OAuthClient) {
    let mut store = MockDocumentStore::new();
    store
        .expect_update_if()
        .returning(|_, _, _| Ok(ConditionalWrite::Applied));
    store.expect_set().never();
    let mut provider = MockTelemetryProvider::new();
    provider.expect_exchange_code().returning(|_| {
        Err(TelemetryProviderError::rejected(
            "unable to get access token: 400 Bad Request",
        ))
    });
    provider.expect_fetch_snapshot().never();
    let linker = OAuthLinker::new(Arc::new(store), Arc::new(provider), client);

    let error: Error = linker
        .complete_login(Some("abc"), Some("state-1"))
        .await
        .expect_err("code rejected")
        .into();

    assert_eq!(error.code(), ErrorCode::Forbidden);
    assert_eq!(error.message(), "unable to get access token: 400 Bad Request");
}

#[rstest]
#[tokio::test]
async fn provider_transport_failure_maps_to_upstream(client: OAuthClient) {
    let mut store = MockDocumentStore::new();
    store
        .expect_update_if()
        .returning(|_, _, _| Ok(ConditionalWrite::Applied));
    let mut provider = MockTelemetryProvider::new();
    provider
        .expect_exchange_code()
        .returning(|_| Err(TelemetryProviderError::transport("connection reset")));
    let linker = OAuthLinker::new(Arc::new(store), Arc::new(provider), client);

    let error: Error = linker
        .complete_login(Some("abc"), Some("state-1"))
        .await
        .expect_err("provider unreachable")
        .into();

    assert_eq!(error.code(), ErrorCode::UpstreamUnavailable);
}

#[rstest]
#[tokio::test]
async fn thermostat_write_failure_keeps_account_record(client: OAuthClient) {
    let mut snapshot = hall_snapshot();
    snapshot
        .thermostats
        .insert("Attic".to_owned(), Document::new());
    let mut store = MockDocumentStore::new();
    store
        .expect_update_if()
        .returning(|_, _, _| Ok(ConditionalWrite::Applied));
    store
        .expect_set()
        .withf(|path, _| path.to_string() == "user/user-9")
        .times(1)
        .returning(|_, _| Ok(()));
    store
        .expect_set()
        .withf(|path, _| path.to_string() == "user/user-9/thermostat/Attic")
        .times(1)
        .returning(|_, _| Err(DocumentStoreError::unavailable("timeout")));
    store
        .expect_set()
        .withf(|path, _| path.to_string() == "user/user-9/thermostat/Hall")
        .never();
    let linker = OAuthLinker::new(
        Arc::new(store),
        Arc::new(provider_with_snapshot(snapshot)),
        client,
    );

    let error = linker
        .complete_login(Some("abc"), Some("state-1"))
        .await
        .expect_err("second write fails");

    assert!(matches!(
        error,
        LinkError::Store {
            what: "thermostat data",
            ..
        }
    ));
    assert_eq!(Error::from(error).code(), ErrorCode::ServiceUnavailable);
}
