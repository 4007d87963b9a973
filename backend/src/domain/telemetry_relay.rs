//! Fan-out of telemetry into device snapshots and per-device logs.
//!
//! Every write touches two documents: `device/{name}` holds the latest
//! reading and is overwritten, `device/{name}/log/{log_key}` keeps history.
//! One relay call shares one log key across all devices it touches so that
//! readings taken together can be correlated later.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info};

use super::oauth_linker::{ACCESS_TOKEN_FIELD, USER_COLLECTION};
use super::ports::{DocumentStore, DocumentStoreError, TelemetryProvider, TelemetryProviderError};
use super::{CollectionPath, Document, DocumentPathError, Error, Value};

/// Collection holding device snapshots.
pub const DEVICE_COLLECTION: &str = "device";
/// Sub-collection of a device holding its history.
pub const LOG_COLLECTION: &str = "log";
/// Identity of the locally attached sensor.
pub const LOCAL_DEVICE: &str = "feather";
/// Field stamped with the store write time on every device document.
pub const TIMESTAMP_FIELD: &str = "timestamp";
/// Provider attribute preferred as the device display name.
pub const NAME_FIELD: &str = "name";

/// Failures raised while relaying or reading telemetry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// The provider refused a stored access token.
    #[error("{message}")]
    Rejected { message: String },
    /// The provider could not be reached or answered garbage.
    #[error("{message}")]
    Upstream { message: String },
    /// A stored record or identifier could not be interpreted.
    #[error("{message}")]
    InvalidData { message: String },
    /// The document store failed; earlier writes stay committed.
    #[error("{message}")]
    Store { message: String },
}

impl RelayError {
    fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }
}

impl From<TelemetryProviderError> for RelayError {
    fn from(error: TelemetryProviderError) -> Self {
        let message = error.to_string();
        match error {
            TelemetryProviderError::Rejected { .. } => Self::Rejected { message },
            TelemetryProviderError::Transport { .. } | TelemetryProviderError::Decode { .. } => {
                Self::Upstream { message }
            }
        }
    }
}

impl From<DocumentStoreError> for RelayError {
    fn from(error: DocumentStoreError) -> Self {
        Self::Store {
            message: error.to_string(),
        }
    }
}

impl From<DocumentPathError> for RelayError {
    fn from(error: DocumentPathError) -> Self {
        Self::invalid_data(error.to_string())
    }
}

impl From<RelayError> for Error {
    fn from(error: RelayError) -> Self {
        let message = error.to_string();
        match error {
            RelayError::Rejected { .. } => Self::forbidden(message),
            RelayError::Upstream { .. } => Self::upstream_unavailable(message),
            RelayError::InvalidData { .. } => Self::internal(message),
            RelayError::Store { .. } => Self::service_unavailable(message),
        }
    }
}

/// Stored credentials of one linked account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    /// Provider-assigned user id.
    pub user_id: String,
    /// Bearer token recorded at link time.
    pub access_token: String,
}

/// Devices written by one successful relay call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelayReport {
    /// Log key shared by every entry of the call.
    pub log_key: String,
    /// Device names in write order.
    pub devices: Vec<String>,
}

/// Format `at` as a log key: RFC 3339, UTC, whole seconds.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use telemetry_relay::domain::log_key_for;
///
/// let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("instant");
/// assert_eq!(log_key_for(at), "2024-01-01T00:00:00Z");
/// ```
pub fn log_key_for(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn display_name<'a>(device_id: &'a str, attributes: &'a Document) -> &'a str {
    attributes
        .get(NAME_FIELD)
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(device_id)
}

/// Writes device telemetry and reads back freshness.
#[derive(Clone)]
pub struct TelemetryRelay {
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn TelemetryProvider>,
}

impl TelemetryRelay {
    /// Build a relay over the given ports.
    pub fn new(store: Arc<dyn DocumentStore>, provider: Arc<dyn TelemetryProvider>) -> Self {
        Self { store, provider }
    }

    /// List every linked account with its access token.
    ///
    /// # Errors
    ///
    /// [`RelayError::InvalidData`] when any account lacks a string token.
    pub async fn linked_accounts(&self) -> Result<Vec<AccountCredentials>, RelayError> {
        let users = CollectionPath::root(USER_COLLECTION)?;
        self.store
            .list(&users)
            .await?
            .into_iter()
            .map(|(user_id, document)| match document.get(ACCESS_TOKEN_FIELD) {
                Some(Value::String(token)) => Ok(AccountCredentials {
                    user_id,
                    access_token: token.clone(),
                }),
                Some(_) => Err(RelayError::invalid_data(format!(
                    "user {user_id} access token was not a string"
                ))),
                None => Err(RelayError::invalid_data(format!(
                    "user {user_id} missing access token"
                ))),
            })
            .collect()
    }

    /// Fetch every linked account's snapshot and fan it out under `log_key`.
    ///
    /// # Errors
    ///
    /// The first provider or store failure aborts the call.
    pub async fn relay_external_snapshot(&self, log_key: &str) -> Result<RelayReport, RelayError> {
        let mut report = RelayReport {
            log_key: log_key.to_owned(),
            devices: Vec::new(),
        };
        for account in self.linked_accounts().await? {
            let snapshot = self.provider.fetch_snapshot(&account.access_token).await?;
            debug!(
                user_id = %account.user_id,
                devices = snapshot.thermostats.len(),
                "fetched provider snapshot"
            );
            for (device_id, attributes) in snapshot.thermostats {
                let name = display_name(&device_id, &attributes).to_owned();
                self.write_device(&name, log_key, attributes).await?;
                report.devices.push(name);
            }
        }
        info!(log_key, devices = report.devices.len(), "relayed provider telemetry");
        Ok(report)
    }

    /// Fan out a locally posted payload for the fixed local device.
    ///
    /// # Errors
    ///
    /// Fails when either write fails.
    pub async fn relay_local_payload(
        &self,
        log_key: &str,
        attributes: Document,
    ) -> Result<RelayReport, RelayError> {
        self.write_device(LOCAL_DEVICE, log_key, attributes).await?;
        info!(log_key, device = LOCAL_DEVICE, "relayed local telemetry");
        Ok(RelayReport {
            log_key: log_key.to_owned(),
            devices: vec![LOCAL_DEVICE.to_owned()],
        })
    }

    /// Latest write time of every device snapshot.
    ///
    /// # Errors
    ///
    /// [`RelayError::InvalidData`] when any snapshot lacks a timestamp; no
    /// partial mapping is returned.
    pub async fn get_most_recent_timestamps(
        &self,
    ) -> Result<BTreeMap<String, DateTime<Utc>>, RelayError> {
        let devices = CollectionPath::root(DEVICE_COLLECTION)?;
        self.store
            .list(&devices)
            .await?
            .into_iter()
            .map(|(name, document)| {
                match document.get(TIMESTAMP_FIELD).and_then(Value::as_timestamp) {
                    Some(at) => Ok((name, at)),
                    None => Err(RelayError::invalid_data(format!(
                        "device {name} has invalid timestamp"
                    ))),
                }
            })
            .collect()
    }

    async fn write_device(
        &self,
        name: &str,
        log_key: &str,
        mut attributes: Document,
    ) -> Result<(), RelayError> {
        attributes.insert(TIMESTAMP_FIELD.to_owned(), Value::ServerTimestamp);
        let snapshot_path = CollectionPath::root(DEVICE_COLLECTION)?.doc(name)?;
        let log_path = snapshot_path.collection(LOG_COLLECTION)?.doc(log_key)?;

        self.store.set(&snapshot_path, attributes.clone()).await?;
        self.store.set(&log_path, attributes).await?;
        debug!(device = name, log_key, "wrote device snapshot and log entry");
        Ok(())
    }
}
