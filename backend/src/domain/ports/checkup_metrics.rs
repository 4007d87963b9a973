//! Observability port for the periodic auditor.
//!
//! Replaces process-wide counters with an explicit recorder so the auditor
//! stays testable and adapters decide how values are exported.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::define_port_error;

define_port_error! {
    /// Errors exposed when recording checkup metrics.
    pub enum CheckupMetricsError {
        /// Metric exporter rejected the write.
        Export { message: String } => "checkup metrics exporter failed: {message}",
    }
}

/// Stage of a checkup tick that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckupStage {
    /// Relaying the external snapshot.
    Relay,
    /// Reading the most recent device timestamps.
    Timestamps,
}

impl CheckupStage {
    /// Stable label used by exporters.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relay => "relay",
            Self::Timestamps => "timestamps",
        }
    }
}

/// Recorder for auditor activity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckupMetrics: Send + Sync {
    /// Record that a tick started at `at` with the configured interval.
    async fn record_tick(
        &self,
        at: DateTime<Utc>,
        interval_seconds: u64,
    ) -> Result<(), CheckupMetricsError>;

    /// Record how many stale devices a tick found.
    async fn record_stale_devices(&self, count: usize) -> Result<(), CheckupMetricsError>;

    /// Record a failed stage.
    async fn record_failure(&self, stage: CheckupStage) -> Result<(), CheckupMetricsError>;
}

/// No-op implementation used when metrics are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCheckupMetrics;

#[async_trait]
impl CheckupMetrics for NoOpCheckupMetrics {
    async fn record_tick(
        &self,
        _at: DateTime<Utc>,
        _interval_seconds: u64,
    ) -> Result<(), CheckupMetricsError> {
        Ok(())
    }

    async fn record_stale_devices(&self, _count: usize) -> Result<(), CheckupMetricsError> {
        Ok(())
    }

    async fn record_failure(&self, _stage: CheckupStage) -> Result<(), CheckupMetricsError> {
        Ok(())
    }
}
