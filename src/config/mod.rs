//! Configuration module for Tollgate
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`TOLLGATE_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use tollgate::config::TollgateConfig;
//!
//! let toml = r#"
//! [retry]
//! max_retries = 5
//! "#;
//! let config: TollgateConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.retry.max_retries, 5);
//! assert_eq!(config.retry.base_delay_ms, 1000);
//! ```

pub mod analytics;
pub mod budget;
pub mod dispatch;
pub mod error;
pub mod logging;

pub use analytics::AnalyticsConfig;
pub use budget::{AlertConfig, AlertRule, LedgerConfig};
pub use dispatch::{PriorityLimit, RateLimitConfig, RetryConfig};
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TollgateConfig {
    /// Budget ledger settings
    pub ledger: LedgerConfig,
    /// Budget alert thresholds
    pub alerts: AlertConfig,
    /// Provider retry/backoff policy
    pub retry: RetryConfig,
    /// Per-priority pacing
    pub rate_limits: RateLimitConfig,
    /// Usage analytics aggregator
    pub analytics: AnalyticsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl TollgateConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supports TOLLGATE_* environment variables for common settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("TOLLGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TOLLGATE_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }
        if let Ok(retries) = std::env::var("TOLLGATE_MAX_RETRIES") {
            if let Ok(r) = retries.parse() {
                self.retry.max_retries = r;
            }
        }
        if let Ok(delay) = std::env::var("TOLLGATE_BASE_DELAY_MS") {
            if let Ok(d) = delay.parse() {
                self.retry.base_delay_ms = d;
            }
        }
        if let Ok(tier) = std::env::var("TOLLGATE_DEFAULT_TIER") {
            if let Ok(t) = tier.parse() {
                self.ledger.default_tier = t;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ledger.validate().map_err(ConfigError::section("ledger"))?;
        self.alerts.validate().map_err(ConfigError::section("alerts"))?;
        self.retry.validate().map_err(ConfigError::section("retry"))?;
        self.rate_limits
            .validate()
            .map_err(ConfigError::section("rate_limits"))?;
        self.analytics
            .validate()
            .map_err(ConfigError::section("analytics"))?;
        self.logging
            .validate()
            .map_err(ConfigError::section("logging"))?;
        Ok(())
    }
}
