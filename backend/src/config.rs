//! Relay configuration loaded via OrthoConfig.
//!
//! Values come from CLI flags, `RELAY_*` environment variables and
//! configuration files. Optional fields fall back to defaults through the
//! accessor methods below.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

use crate::domain::AuditorConfig;
use crate::outbound::nest::{
    ClientCredentials, DEFAULT_API_URL, DEFAULT_AUTHORIZE_URL, DEFAULT_TOKEN_URL, NestEndpoints,
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_BLOB_ROOT: &str = "images";
const DEFAULT_PROJECT_ID: &str = "default";
const DEFAULT_PROVIDER_TIMEOUT_SECONDS: u64 = 30;

/// Invalid or missing settings detected at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelaySettingsError {
    #[error("client_id and client_secret must both be configured")]
    MissingClientCredentials,
    #[error("invalid bind address {value:?}: {message}")]
    InvalidBindAddr { value: String, message: String },
    #[error("invalid {field} {value:?}: {message}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        message: String,
    },
}

/// Configuration values for the relay process.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "RELAY")]
pub struct RelaySettings {
    /// OAuth client identifier registered with the provider.
    pub client_id: Option<String>,
    /// OAuth client secret registered with the provider.
    pub client_secret: Option<String>,
    /// Document store project; rows of different projects never mix.
    pub project_id: Option<String>,
    /// PostgreSQL URL; the in-memory store is used when absent.
    pub database_url: Option<String>,
    /// Listen address for the HTTP server.
    pub bind_addr: Option<String>,
    /// Directory receiving uploaded images.
    pub blob_root: Option<PathBuf>,
    /// Seconds between auditor ticks; zero means the default.
    pub checkup_interval_seconds: Option<u64>,
    /// Relay the provider snapshot at the start of every auditor tick.
    pub checkup_relay: Option<bool>,
    /// Timeout applied to each provider request.
    pub provider_timeout_seconds: Option<u64>,
    pub authorize_url: Option<String>,
    pub token_url: Option<String>,
    pub api_url: Option<String>,
}

fn parse_url(
    field: &'static str,
    value: Option<&str>,
    default: &str,
) -> Result<Url, RelaySettingsError> {
    let value = value.unwrap_or(default);
    Url::parse(value).map_err(|err| RelaySettingsError::InvalidUrl {
        field,
        value: value.to_owned(),
        message: err.to_string(),
    })
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|value| !value.trim().is_empty())
}

impl RelaySettings {
    /// Client id and secret, both required.
    ///
    /// # Errors
    ///
    /// [`RelaySettingsError::MissingClientCredentials`] when either is unset
    /// or blank.
    pub fn client_credentials(&self) -> Result<ClientCredentials, RelaySettingsError> {
        match (
            non_blank(self.client_id.as_ref()),
            non_blank(self.client_secret.as_ref()),
        ) {
            (Some(client_id), Some(client_secret)) => Ok(ClientCredentials {
                client_id: client_id.to_owned(),
                client_secret: client_secret.to_owned(),
            }),
            _ => Err(RelaySettingsError::MissingClientCredentials),
        }
    }

    pub fn project_id(&self) -> &str {
        non_blank(self.project_id.as_ref()).unwrap_or(DEFAULT_PROJECT_ID)
    }

    pub fn database_url(&self) -> Option<&str> {
        non_blank(self.database_url.as_ref())
    }

    /// Parsed listen address.
    ///
    /// # Errors
    ///
    /// [`RelaySettingsError::InvalidBindAddr`] when the value is not a
    /// socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, RelaySettingsError> {
        let value = non_blank(self.bind_addr.as_ref()).unwrap_or(DEFAULT_BIND_ADDR);
        value
            .parse()
            .map_err(|err: std::net::AddrParseError| RelaySettingsError::InvalidBindAddr {
                value: value.to_owned(),
                message: err.to_string(),
            })
    }

    pub fn blob_root(&self) -> PathBuf {
        self.blob_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BLOB_ROOT))
    }

    /// Auditor timing; an unset or zero interval becomes one hour.
    pub fn auditor(&self) -> AuditorConfig {
        let mut config =
            AuditorConfig::from_interval_seconds(self.checkup_interval_seconds.unwrap_or(0));
        config.relay_on_tick = self.checkup_relay.unwrap_or(true);
        config
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(
            self.provider_timeout_seconds
                .filter(|seconds| *seconds > 0)
                .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECONDS),
        )
    }

    /// Provider consent page.
    ///
    /// # Errors
    ///
    /// [`RelaySettingsError::InvalidUrl`] when the override does not parse.
    pub fn authorize_url(&self) -> Result<Url, RelaySettingsError> {
        parse_url(
            "authorize_url",
            non_blank(self.authorize_url.as_ref()),
            DEFAULT_AUTHORIZE_URL,
        )
    }

    /// Token and API endpoints for the provider adapter.
    ///
    /// # Errors
    ///
    /// [`RelaySettingsError::InvalidUrl`] when an override does not parse.
    pub fn provider_endpoints(&self) -> Result<NestEndpoints, RelaySettingsError> {
        Ok(NestEndpoints {
            token_url: parse_url(
                "token_url",
                non_blank(self.token_url.as_ref()),
                DEFAULT_TOKEN_URL,
            )?,
            api_url: parse_url("api_url", non_blank(self.api_url.as_ref()), DEFAULT_API_URL)?,
        })
    }
}
