//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod blob_store;
mod checkup_metrics;
mod document_store;
mod telemetry_provider;

#[cfg(test)]
pub use blob_store::MockBlobStore;
pub use blob_store::{BlobStore, BlobStoreError};
#[cfg(test)]
pub use checkup_metrics::MockCheckupMetrics;
pub use checkup_metrics::{
    CheckupMetrics, CheckupMetricsError, CheckupStage, NoOpCheckupMetrics,
};
#[cfg(test)]
pub use document_store::MockDocumentStore;
pub use document_store::{ConditionalWrite, DocumentStore, DocumentStoreError, Precondition};
#[cfg(test)]
pub use telemetry_provider::MockTelemetryProvider;
pub use telemetry_provider::{
    AccessGrant, TelemetryProvider, TelemetryProviderError, TelemetrySnapshot,
};
