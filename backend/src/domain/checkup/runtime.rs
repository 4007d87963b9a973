//! Production runtime helpers for the auditor.

use std::time::Duration;

use async_trait::async_trait;

use super::CheckupSleeper;

/// Tokio-based sleeper implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl CheckupSleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
