//! Thermostat provider outbound adapter.
//!
//! Thin HTTP implementation of the `TelemetryProvider` port against the Nest
//! REST API.

mod dto;
mod http_provider;

pub use http_provider::{
    ClientCredentials, DEFAULT_API_URL, DEFAULT_AUTHORIZE_URL, DEFAULT_TOKEN_URL, MAX_REDIRECTS,
    NestEndpoints, NestHttpProvider,
};
