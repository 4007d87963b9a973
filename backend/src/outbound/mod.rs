//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **memory**: process-local document store used without a database
//! - **persistence**: PostgreSQL document store using Diesel ORM
//! - **nest**: reqwest client for the thermostat provider API
//! - **blob**: `cap-std` filesystem storage for uploaded images
//! - **metrics**: Prometheus-backed metrics exporters (feature-gated)
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod blob;
pub mod memory;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod nest;
pub mod persistence;
