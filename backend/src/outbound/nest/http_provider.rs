//! Reqwest-backed thermostat provider adapter.
//!
//! This adapter owns transport details only: the token exchange form post,
//! the bearer-authenticated snapshot read with manual redirect handling, and
//! HTTP error mapping.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, LOCATION};
use reqwest::{Client, StatusCode, Url, redirect};
use tracing::debug;

use super::dto::{AccessTokenDto, SnapshotDto};
use crate::domain::ports::{
    AccessGrant, TelemetryProvider, TelemetryProviderError, TelemetrySnapshot,
};

/// Redirect hops followed before giving up on a snapshot read.
pub const MAX_REDIRECTS: usize = 10;

/// Production authorization endpoint.
pub const DEFAULT_AUTHORIZE_URL: &str = "https://home.nest.com/login/oauth2";
/// Production token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://api.home.nest.com/oauth2/access_token";
/// Production API root.
pub const DEFAULT_API_URL: &str = "https://developer-api.nest.com";

/// Registered application credentials.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    /// Public client id.
    pub client_id: String,
    /// Client secret sent on code exchange.
    pub client_secret: String,
}

/// Endpoints contacted by the adapter.
#[derive(Debug, Clone)]
pub struct NestEndpoints {
    /// Token exchange endpoint.
    pub token_url: Url,
    /// API root returning the account snapshot.
    pub api_url: Url,
}

/// Provider adapter speaking the Nest REST API.
pub struct NestHttpProvider {
    client: Client,
    credentials: ClientCredentials,
    endpoints: NestEndpoints,
}

impl NestHttpProvider {
    /// Build an adapter with a request timeout and redirects disabled.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        credentials: ClientCredentials,
        endpoints: NestEndpoints,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            credentials,
            endpoints,
        })
    }
}

#[async_trait]
impl TelemetryProvider for NestHttpProvider {
    async fn exchange_code(&self, code: &str) -> Result<AccessGrant, TelemetryProviderError> {
        let response = self
            .client
            .post(self.endpoints.token_url.clone())
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            debug!(status = %status, body = %body_preview(&body), "token exchange rejected");
            return Err(TelemetryProviderError::rejected(format!(
                "unable to get access token: {status}"
            )));
        }
        let token: AccessTokenDto = serde_json::from_slice(&body)
            .map_err(|error| TelemetryProviderError::decode(error.to_string()))?;
        Ok(token.into())
    }

    async fn fetch_snapshot(
        &self,
        access_token: &str,
    ) -> Result<TelemetrySnapshot, TelemetryProviderError> {
        let bearer = format!("Bearer {access_token}");
        let mut url = self.endpoints.api_url.clone();
        let mut hops = 0;
        let response = loop {
            let response = self
                .client
                .get(url.clone())
                .header(AUTHORIZATION, bearer.as_str())
                .header(CONTENT_TYPE, "application/json")
                .send()
                .await
                .map_err(map_transport_error)?;
            let Some(next) = redirect_target(&url, response.status(), &response)? else {
                break response;
            };
            hops += 1;
            if hops > MAX_REDIRECTS {
                return Err(TelemetryProviderError::transport(format!(
                    "stopped after {MAX_REDIRECTS} redirects"
                )));
            }
            debug!(from = %url, to = %next, hops, "following provider redirect");
            url = next;
        };

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(TelemetryProviderError::rejected(format!(
                "unable to get metadata: {status}: {}",
                body_preview(&body)
            )));
        }
        parse_snapshot(&body)
    }
}

fn redirect_target(
    current: &Url,
    status: StatusCode,
    response: &reqwest::Response,
) -> Result<Option<Url>, TelemetryProviderError> {
    if !status.is_redirection() {
        return Ok(None);
    }
    let Some(location) = response.headers().get(LOCATION) else {
        return Ok(None);
    };
    let location = location.to_str().map_err(|error| {
        TelemetryProviderError::transport(format!("invalid redirect location: {error}"))
    })?;
    current.join(location).map(Some).map_err(|error| {
        TelemetryProviderError::transport(format!("invalid redirect location: {error}"))
    })
}

fn parse_snapshot(body: &[u8]) -> Result<TelemetrySnapshot, TelemetryProviderError> {
    let decoded: SnapshotDto = serde_json::from_slice(body)
        .map_err(|error| TelemetryProviderError::decode(error.to_string()))?;
    decoded
        .into_domain()
        .map_err(TelemetryProviderError::decode)
}

fn map_transport_error(error: reqwest::Error) -> TelemetryProviderError {
    TelemetryProviderError::transport(error.to_string())
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
