//! Exponential backoff between provider attempts.

use crate::config::RetryConfig;
use std::time::Duration;

/// Delay before retry `n` (0-based) is `initial * 2^n`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.initial.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Total time slept by a request that fails every one of `retries` retries
    pub fn total_for(&self, retries: u32) -> Duration {
        (0..retries).map(|attempt| self.delay_for(attempt)).sum()
    }
}

impl From<&RetryConfig> for ExponentialBackoff {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.base_delay(), config.max_delay())
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}
