//! Retry and pacing configuration for the request dispatcher

use crate::task::Priority;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff policy for provider calls.
///
/// Delay before retry `n` (0-based) is `base_delay_ms * 2^n`, capped at
/// `max_delay_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt for requests built with `EngineContext::request`
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_delay_ms > self.max_delay_ms {
            return Err("base_delay_ms must be <= max_delay_ms".to_string());
        }
        Ok(())
    }
}

/// Pacing limits for one priority level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityLimit {
    pub requests_per_minute: u32,
    pub max_concurrent: u32,
}

impl PriorityLimit {
    pub const fn new(requests_per_minute: u32, max_concurrent: u32) -> Self {
        Self {
            requests_per_minute,
            max_concurrent,
        }
    }
}

/// Per-(tenant, priority) pacing configuration
///
/// # Example
///
/// ```toml
/// [rate_limits]
/// window_seconds = 60
///
/// [rate_limits.high]
/// requests_per_minute = 60
/// max_concurrent = 10
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Length of the sliding window
    pub window_seconds: u64,
    pub low: PriorityLimit,
    pub normal: PriorityLimit,
    pub high: PriorityLimit,
    pub critical: PriorityLimit,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_seconds: 60,
            low: PriorityLimit::new(10, 2),
            normal: PriorityLimit::new(30, 5),
            high: PriorityLimit::new(60, 10),
            critical: PriorityLimit::new(120, 20),
        }
    }
}

impl RateLimitConfig {
    pub fn limit_for(&self, priority: Priority) -> PriorityLimit {
        match priority {
            Priority::Low => self.low,
            Priority::Normal => self.normal,
            Priority::High => self.high,
            Priority::Critical => self.critical,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.window_seconds == 0 {
            return Err("window_seconds must be >= 1".to_string());
        }
        for priority in Priority::ALL {
            let limit = self.limit_for(priority);
            if limit.requests_per_minute == 0 || limit.max_concurrent == 0 {
                return Err(format!(
                    "{} limits must be >= 1 (requests_per_minute and max_concurrent)",
                    priority
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_rejects_inverted_delays() {
        let config = RetryConfig {
            base_delay_ms: 5_000,
            max_delay_ms: 1_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rate_limits_scale_with_priority() {
        let config = RateLimitConfig::default();
        let mut previous = 0;
        for priority in Priority::ALL {
            let limit = config.limit_for(priority);
            assert!(limit.requests_per_minute > previous);
            previous = limit.requests_per_minute;
        }
    }

    #[test]
    fn test_rate_limits_reject_zero() {
        let config = RateLimitConfig {
            normal: PriorityLimit::new(0, 5),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RateLimitConfig {
            window_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rate_limits_partial_toml() {
        let toml = r#"
        [high]
        requests_per_minute = 5
        max_concurrent = 1
        "#;
        let config: RateLimitConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.high, PriorityLimit::new(5, 1));
        assert_eq!(config.low, PriorityLimit::new(10, 2));
    }
}
