//! Frame fetch retry policy

use std::time::Duration;

use tracing::info;

use crate::config::RetryConfig;

/// What to do after a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then fetch again
    Retry(Duration),
    /// Consecutive failure cap reached
    GiveUp,
}

/// Exponential backoff with failure counters
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_consecutive: Option<u32>,
    consecutive: u32,
    total: u64,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms.max(config.base_delay_ms)),
            max_consecutive: config.max_consecutive_failures,
            consecutive: 0,
            total: 0,
        }
    }

    /// Count a failure and pick the backoff: base * 2^(n-1), capped
    pub fn record_failure(&mut self) -> RetryDecision {
        self.consecutive = self.consecutive.saturating_add(1);
        self.total += 1;

        if let Some(cap) = self.max_consecutive {
            if self.consecutive > cap {
                return RetryDecision::GiveUp;
            }
        }

        let shift = (self.consecutive - 1).min(31);
        let delay = self
            .base_delay
            .checked_mul(1u32 << shift)
            .map_or(self.max_delay, |d| d.min(self.max_delay));
        RetryDecision::Retry(delay)
    }

    pub fn record_success(&mut self) {
        if self.consecutive > 0 {
            info!("Camera recovered after {} failed fetches", self.consecutive);
        }
        self.consecutive = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }

    pub fn total_failures(&self) -> u64 {
        self.total
    }
}
