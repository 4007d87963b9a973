//! HTTP inbound adapter exposing the relay endpoints.

pub mod error;
pub mod health;
pub mod images;
pub mod oauth;
pub mod state;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;

pub use error::ApiResult;
