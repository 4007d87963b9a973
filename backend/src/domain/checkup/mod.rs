//! Periodic freshness audit of relayed devices.
//!
//! Each tick optionally relays a fresh provider snapshot, then flags devices
//! whose latest write lags the clock by more than the stale threshold. Tick
//! failures are logged and never stop the loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use tracing::{info, warn};

use super::ports::{CheckupMetrics, CheckupStage};
use super::TraceId;
use super::telemetry_relay::{TelemetryRelay, log_key_for};

mod runtime;

pub use runtime::TokioSleeper;

/// Interval applied when none is configured.
pub const DEFAULT_CHECKUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Auditor tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditorConfig {
    /// Delay between ticks.
    pub interval: Duration,
    /// Lag after which a device counts as stale.
    pub stale_after: Duration,
    /// Relay the provider snapshot before reading timestamps.
    pub relay_on_tick: bool,
}

impl AuditorConfig {
    /// Build a config from an interval in seconds; zero selects the default.
    ///
    /// ```
    /// use telemetry_relay::domain::AuditorConfig;
    ///
    /// assert_eq!(AuditorConfig::from_interval_seconds(0).interval.as_secs(), 3600);
    /// assert_eq!(AuditorConfig::from_interval_seconds(60).interval.as_secs(), 60);
    /// ```
    pub fn from_interval_seconds(seconds: u64) -> Self {
        let interval = if seconds == 0 {
            DEFAULT_CHECKUP_INTERVAL
        } else {
            Duration::from_secs(seconds)
        };
        Self {
            interval,
            ..Self::default()
        }
    }
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_CHECKUP_INTERVAL,
            stale_after: Duration::from_secs(3600),
            relay_on_tick: true,
        }
    }
}

/// Async sleep used between ticks.
#[async_trait]
pub trait CheckupSleeper: Send + Sync {
    /// Suspend execution for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// A device whose latest snapshot is older than the threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleDevice {
    /// Device name.
    pub name: String,
    /// Time of its latest write.
    pub last_seen: DateTime<Utc>,
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckupReport {
    /// Devices written by the relay step, if it ran and succeeded.
    pub relayed: Option<Vec<String>>,
    /// Devices found stale; empty when the timestamp read failed.
    pub stale: Vec<StaleDevice>,
    /// Whether the timestamp read succeeded.
    pub timestamps_read: bool,
}

/// Background auditor.
pub struct PeriodicAuditor {
    relay: TelemetryRelay,
    metrics: Arc<dyn CheckupMetrics>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn CheckupSleeper>,
    config: AuditorConfig,
}

impl PeriodicAuditor {
    /// Assemble an auditor.
    pub fn new(
        relay: TelemetryRelay,
        metrics: Arc<dyn CheckupMetrics>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn CheckupSleeper>,
        config: AuditorConfig,
    ) -> Self {
        Self {
            relay,
            metrics,
            clock,
            sleeper,
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &AuditorConfig {
        &self.config
    }

    /// Run a single audit pass.
    pub async fn tick(&self) -> CheckupReport {
        let started = self.clock.utc();
        let _ = self
            .metrics
            .record_tick(started, self.config.interval.as_secs())
            .await;

        let mut report = CheckupReport::default();
        if self.config.relay_on_tick {
            match self.relay.relay_external_snapshot(&log_key_for(started)).await {
                Ok(relayed) => report.relayed = Some(relayed.devices),
                Err(error) => {
                    warn!(error = %error, "checkup relay failed");
                    let _ = self.metrics.record_failure(CheckupStage::Relay).await;
                }
            }
        }

        let timestamps = match self.relay.get_most_recent_timestamps().await {
            Ok(timestamps) => timestamps,
            Err(error) => {
                warn!(error = %error, "checkup could not read device timestamps");
                let _ = self.metrics.record_failure(CheckupStage::Timestamps).await;
                return report;
            }
        };
        report.timestamps_read = true;

        let now = self.clock.utc();
        for (name, last_seen) in timestamps {
            // Future timestamps fail `to_std` and are never stale.
            let Ok(lag) = now.signed_duration_since(last_seen).to_std() else {
                continue;
            };
            if lag > self.config.stale_after {
                warn!(
                    device = %name,
                    last_seen = %last_seen,
                    lag_seconds = lag.as_secs(),
                    "device is stale"
                );
                report.stale.push(StaleDevice { name, last_seen });
            }
        }
        let _ = self.metrics.record_stale_devices(report.stale.len()).await;
        info!(stale = report.stale.len(), "checkup complete");
        report
    }

    /// Tick, then sleep for the interval, `ticks` times; forever when `None`.
    pub async fn run(&self, ticks: Option<usize>) {
        let mut remaining = ticks;
        loop {
            if let Some(left) = remaining.as_mut() {
                if *left == 0 {
                    return;
                }
                *left -= 1;
            }
            TraceId::scope(TraceId::generate(), self.tick()).await;
            self.sleeper.sleep(self.config.interval).await;
        }
    }

    /// Tick and sleep until the task is dropped.
    pub async fn run_forever(&self) {
        self.run(None).await;
    }
}
