//! Prometheus adapter for auditor activity.
//!
//! Replaces the process-wide interval and last-run variables with gauges and
//! adds counters for stale devices and failed stages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prometheus::{CounterVec, Gauge, IntCounter, Opts, Registry};

use crate::domain::ports::{CheckupMetrics, CheckupMetricsError, CheckupStage};

/// Prometheus-backed recorder for checkup ticks.
pub struct PrometheusCheckupMetrics {
    interval_seconds: Gauge,
    last_run_timestamp_seconds: Gauge,
    stale_devices_total: IntCounter,
    failures_total: CounterVec,
}

impl PrometheusCheckupMetrics {
    /// Create and register the metric families with `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error when Prometheus rejects metric registration.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let interval_seconds = Gauge::with_opts(Opts::new(
            "checkup_interval_seconds",
            "Configured delay between checkup ticks",
        ))?;
        let last_run_timestamp_seconds = Gauge::with_opts(Opts::new(
            "checkup_last_run_timestamp_seconds",
            "Unix time at which the last checkup tick started",
        ))?;
        let stale_devices_total = IntCounter::with_opts(Opts::new(
            "checkup_stale_devices_total",
            "Stale device notices emitted by checkup ticks",
        ))?;
        let failures_total = CounterVec::new(
            Opts::new("checkup_failures_total", "Failed checkup stages"),
            &["stage"],
        )?;
        registry.register(Box::new(interval_seconds.clone()))?;
        registry.register(Box::new(last_run_timestamp_seconds.clone()))?;
        registry.register(Box::new(stale_devices_total.clone()))?;
        registry.register(Box::new(failures_total.clone()))?;
        Ok(Self {
            interval_seconds,
            last_run_timestamp_seconds,
            stale_devices_total,
            failures_total,
        })
    }
}

#[async_trait]
impl CheckupMetrics for PrometheusCheckupMetrics {
    async fn record_tick(
        &self,
        at: DateTime<Utc>,
        interval_seconds: u64,
    ) -> Result<(), CheckupMetricsError> {
        self.interval_seconds.set(interval_seconds as f64);
        self.last_run_timestamp_seconds.set(at.timestamp() as f64);
        Ok(())
    }

    async fn record_stale_devices(&self, count: usize) -> Result<(), CheckupMetricsError> {
        let count = u64::try_from(count)
            .map_err(|error| CheckupMetricsError::export(error.to_string()))?;
        self.stale_devices_total.inc_by(count);
        Ok(())
    }

    async fn record_failure(&self, stage: CheckupStage) -> Result<(), CheckupMetricsError> {
        self.failures_total
            .with_label_values(&[stage.as_str()])
            .inc();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for checkup metric families.

    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn make_metrics() -> (Registry, PrometheusCheckupMetrics) {
        let registry = Registry::new();
        let metrics = PrometheusCheckupMetrics::new(&registry)
            .expect("metric registration should succeed");
        (registry, metrics)
    }

    #[test]
    fn registers_every_family() {
        let (registry, metrics) = make_metrics();
        metrics.failures_total.with_label_values(&["relay"]).inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.name().to_owned())
            .collect();

        for expected in [
            "checkup_interval_seconds",
            "checkup_last_run_timestamp_seconds",
            "checkup_stale_devices_total",
            "checkup_failures_total",
        ] {
            assert!(names.iter().any(|name| name == expected), "{expected} missing");
        }
    }

    #[tokio::test]
    async fn tick_sets_interval_and_last_run() {
        let (_registry, metrics) = make_metrics();
        let at = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("valid instant");

        metrics.record_tick(at, 3600).await.expect("record tick");

        assert_eq!(metrics.interval_seconds.get(), 3600.0);
        assert_eq!(metrics.last_run_timestamp_seconds.get(), 1_704_067_200.0);
    }

    #[rstest]
    #[case::relay(CheckupStage::Relay)]
    #[case::timestamps(CheckupStage::Timestamps)]
    #[tokio::test]
    async fn failures_are_labelled_by_stage(#[case] stage: CheckupStage) {
        let (_registry, metrics) = make_metrics();

        metrics.record_failure(stage).await.expect("record failure");
        metrics.record_stale_devices(2).await.expect("record stale");

        let counter = metrics.failures_total.with_label_values(&[stage.as_str()]);
        assert_eq!(counter.get() as u64, 1);
        assert_eq!(metrics.stale_devices_total.get(), 2);
    }
}
