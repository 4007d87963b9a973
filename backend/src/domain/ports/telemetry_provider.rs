//! Third-party thermostat API capability.
//!
//! The provider turns an OAuth authorization code into an access token and
//! returns the account's current device snapshot for a token.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::Document;

define_port_error! {
    /// Errors raised by telemetry provider adapters.
    pub enum TelemetryProviderError {
        /// The provider answered with a non-success status (bad code or token).
        Rejected { message: String } => "{message}",
        /// The provider could not be reached.
        Transport { message: String } => "unable to connect to provider: {message}",
        /// The provider answered with a body that could not be decoded.
        Decode { message: String } => "unable to parse provider response: {message}",
    }
}

/// Result of a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    /// Bearer token for subsequent snapshot requests.
    pub access_token: String,
    /// Lifetime in seconds as reported by the provider.
    pub expires_in: i64,
}

/// Current state of one linked account.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetrySnapshot {
    /// Provider-assigned user identifier.
    pub user_id: String,
    /// Token echoed back by the provider.
    pub access_token: String,
    /// Thermostat attribute maps keyed by provider device id.
    pub thermostats: BTreeMap<String, Document>,
}

/// Outbound access to the thermostat provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    /// Exchange an authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<AccessGrant, TelemetryProviderError>;

    /// Fetch the device snapshot visible to `access_token`.
    async fn fetch_snapshot(
        &self,
        access_token: &str,
    ) -> Result<TelemetrySnapshot, TelemetryProviderError>;
}
