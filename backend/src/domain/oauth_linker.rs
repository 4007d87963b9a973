//! OAuth authorization-code flow linking a provider account.
//!
//! `begin_login` issues a state token and builds the provider redirect;
//! `complete_login` consumes the token, exchanges the code, and records the
//! linked account with its thermostats. Device snapshots and logs are left
//! to [`crate::domain::TelemetryRelay`].

use std::sync::Arc;

use tracing::{debug, info};
use url::Url;

use super::ports::{DocumentStore, TelemetryProvider, TelemetryProviderError, TelemetrySnapshot};
use super::state_tokens::{StateTokenError, StateTokenManager};
use super::{CollectionPath, Document, DocumentPath, DocumentPathError, Error, Value};

/// Collection holding linked accounts.
pub const USER_COLLECTION: &str = "user";
/// Sub-collection of a linked account holding its thermostats.
pub const THERMOSTAT_COLLECTION: &str = "thermostat";
/// Field of a linked account holding the bearer token.
pub const ACCESS_TOKEN_FIELD: &str = "access_token";

/// Failures raised by the OAuth flow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// `code` or `state` was missing from the callback.
    #[error("missing code or state")]
    MissingParameters,
    /// The state token was unknown, already used, or unreadable.
    #[error(transparent)]
    State(#[from] StateTokenError),
    /// The provider rejected the code or the token.
    #[error("{message}")]
    Rejected { message: String },
    /// The provider could not be reached or answered garbage.
    #[error("{message}")]
    Upstream { message: String },
    /// The provider returned an identifier that cannot address a document.
    #[error("provider returned unusable identifier: {message}")]
    InvalidData { message: String },
    /// A write failed; earlier writes stay committed.
    #[error("unable to write {what} to store: {message}")]
    Store { what: &'static str, message: String },
}

impl From<TelemetryProviderError> for LinkError {
    fn from(error: TelemetryProviderError) -> Self {
        match error {
            TelemetryProviderError::Rejected { .. } => Self::Rejected {
                message: error.to_string(),
            },
            TelemetryProviderError::Transport { .. } | TelemetryProviderError::Decode { .. } => {
                Self::Upstream {
                    message: error.to_string(),
                }
            }
        }
    }
}

impl From<DocumentPathError> for LinkError {
    fn from(error: DocumentPathError) -> Self {
        Self::InvalidData {
            message: error.to_string(),
        }
    }
}

impl From<LinkError> for Error {
    fn from(error: LinkError) -> Self {
        let message = error.to_string();
        match error {
            LinkError::MissingParameters => Self::invalid_request(message),
            LinkError::State(StateTokenError::StoreUnavailable { .. })
            | LinkError::Store { .. } => Self::service_unavailable(message),
            LinkError::State(_) | LinkError::Rejected { .. } => Self::forbidden(message),
            LinkError::Upstream { .. } => Self::upstream_unavailable(message),
            LinkError::InvalidData { .. } => Self::internal(message),
        }
    }
}

/// Application credentials registered with the provider.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Public client identifier embedded in the redirect.
    pub client_id: String,
    /// Provider authorization endpoint.
    pub authorize_url: Url,
}

/// Summary of a completed link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAccount {
    /// Provider-assigned user id.
    pub user_id: String,
    /// Provider device ids written under the account, in write order.
    pub thermostat_ids: Vec<String>,
}

/// Orchestrates the OAuth round trip.
#[derive(Clone)]
pub struct OAuthLinker {
    tokens: StateTokenManager,
    provider: Arc<dyn TelemetryProvider>,
    store: Arc<dyn DocumentStore>,
    client: OAuthClient,
}

impl OAuthLinker {
    /// Build a linker; state tokens share `store` with account records.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn TelemetryProvider>,
        client: OAuthClient,
    ) -> Self {
        Self {
            tokens: StateTokenManager::new(store.clone()),
            provider,
            store,
            client,
        }
    }

    /// Issue a state token and return the provider authorization URL.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::State`] when the token cannot be stored.
    pub async fn begin_login(&self) -> Result<String, LinkError> {
        let state = self.tokens.create_token().await?;
        let mut url = self.client.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client.client_id)
            .append_pair("state", &state);
        Ok(url.into())
    }

    /// Finish the OAuth callback.
    ///
    /// Parameters are checked before any port is touched, and the provider
    /// is only contacted once the state token has been consumed.
    ///
    /// # Errors
    ///
    /// See [`LinkError`]; a failing per-device write aborts the loop.
    pub async fn complete_login(
        &self,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<LinkedAccount, LinkError> {
        let (code, state) = match (non_empty(code), non_empty(state)) {
            (Some(code), Some(state)) => (code, state),
            _ => return Err(LinkError::MissingParameters),
        };

        self.tokens.validate_and_consume(state).await?;

        let grant = self.provider.exchange_code(code).await?;
        let snapshot = self.provider.fetch_snapshot(&grant.access_token).await?;
        debug!(
            user_id = %snapshot.user_id,
            devices = snapshot.thermostats.len(),
            "fetched provider snapshot for new link"
        );

        let access_token = if snapshot.access_token.is_empty() {
            grant.access_token
        } else {
            snapshot.access_token.clone()
        };
        self.persist(snapshot, access_token).await
    }

    async fn persist(
        &self,
        snapshot: TelemetrySnapshot,
        access_token: String,
    ) -> Result<LinkedAccount, LinkError> {
        let TelemetrySnapshot {
            user_id,
            thermostats,
            ..
        } = snapshot;
        let user_path: DocumentPath = CollectionPath::root(USER_COLLECTION)?.doc(&user_id)?;
        let account = Document::from([(ACCESS_TOKEN_FIELD.to_owned(), Value::from(access_token))]);
        self.store
            .set(&user_path, account)
            .await
            .map_err(|err| LinkError::Store {
                what: "user data",
                message: err.to_string(),
            })?;

        let thermostat_collection = user_path.collection(THERMOSTAT_COLLECTION)?;
        let mut thermostat_ids = Vec::with_capacity(thermostats.len());
        for (device_id, attributes) in thermostats {
            let path = thermostat_collection.doc(&device_id)?;
            self.store
                .set(&path, attributes)
                .await
                .map_err(|err| LinkError::Store {
                    what: "thermostat data",
                    message: err.to_string(),
                })?;
            thermostat_ids.push(device_id);
        }

        info!(user_id = %user_id, devices = thermostat_ids.len(), "linked provider account");
        Ok(LinkedAccount {
            user_id,
            thermostat_ids,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests;
