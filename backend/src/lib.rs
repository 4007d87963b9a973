//! Telemetry relay library modules.
//!
//! The relay links a thermostat provider account through OAuth, fans device
//! telemetry out into a document store and audits device freshness.

pub mod config;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use domain::TraceId;
pub use middleware::Trace;
