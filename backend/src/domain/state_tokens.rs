//! Single-use anti-forgery tokens backing the OAuth round trip.
//!
//! A token is a document in the `auth` collection whose id is handed to the
//! provider as the `state` parameter. Consumption is a compare-and-set on
//! the `used` flag, so concurrent callbacks carrying the same state cannot
//! both succeed.

use std::sync::Arc;

use tracing::{debug, info};

use super::ports::{ConditionalWrite, DocumentStore, DocumentStoreError, Precondition};
use super::{CollectionPath, Document, DocumentPath, Error, Value};

/// Collection holding state tokens.
pub const AUTH_COLLECTION: &str = "auth";

/// Failures raised while creating or consuming a state token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateTokenError {
    /// No token exists with this id.
    #[error("unknown oauth state")]
    NotFound,
    /// The token was already consumed.
    #[error("invalid oauth state")]
    AlreadyUsed,
    /// The store could not be read or written.
    #[error("unable to access oauth state: {message}")]
    StoreUnavailable { message: String },
}

impl From<DocumentStoreError> for StateTokenError {
    fn from(error: DocumentStoreError) -> Self {
        Self::StoreUnavailable {
            message: error.to_string(),
        }
    }
}

impl From<StateTokenError> for Error {
    fn from(error: StateTokenError) -> Self {
        match error {
            StateTokenError::NotFound => Self::not_found(error.to_string()),
            StateTokenError::AlreadyUsed => Self::forbidden(error.to_string()),
            StateTokenError::StoreUnavailable { .. } => {
                Self::service_unavailable(error.to_string())
            }
        }
    }
}

/// Creates and consumes state tokens.
#[derive(Clone)]
pub struct StateTokenManager {
    store: Arc<dyn DocumentStore>,
}

impl StateTokenManager {
    /// Build a manager over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn collection() -> Result<CollectionPath, StateTokenError> {
        CollectionPath::root(AUTH_COLLECTION).map_err(|err| StateTokenError::StoreUnavailable {
            message: err.to_string(),
        })
    }

    /// Insert a fresh unused token and return its id.
    ///
    /// The creation time is assigned by the store, never by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`StateTokenError::StoreUnavailable`] when the insert fails.
    pub async fn create_token(&self) -> Result<String, StateTokenError> {
        let document = Document::from([
            ("used".to_owned(), Value::Bool(false)),
            ("created".to_owned(), Value::ServerTimestamp),
        ]);
        let token = self.store.add(&Self::collection()?, document).await?;
        debug!(state = %token, "issued oauth state token");
        Ok(token)
    }

    /// Mark `token` used, failing if it is unknown or already consumed.
    ///
    /// # Errors
    ///
    /// - [`StateTokenError::NotFound`] when no such token exists.
    /// - [`StateTokenError::AlreadyUsed`] when the token was consumed before.
    /// - [`StateTokenError::StoreUnavailable`] when the store fails.
    pub async fn validate_and_consume(&self, token: &str) -> Result<(), StateTokenError> {
        // A malformed id cannot name a stored token.
        let path: DocumentPath = Self::collection()?
            .doc(token)
            .map_err(|_| StateTokenError::NotFound)?;
        let changes = Document::from([
            ("used".to_owned(), Value::Bool(true)),
            ("updated".to_owned(), Value::ServerTimestamp),
        ]);
        let guard = Precondition::field_equals("used", false);

        match self.store.update_if(&path, &guard, changes).await? {
            ConditionalWrite::Applied => {
                info!(state = %token, "consumed oauth state token");
                Ok(())
            }
            ConditionalWrite::Missing => Err(StateTokenError::NotFound),
            ConditionalWrite::PreconditionFailed => Err(StateTokenError::AlreadyUsed),
        }
    }
}
