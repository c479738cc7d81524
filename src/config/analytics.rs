//! Usage analytics configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the usage analytics aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// How long a computed report is served from cache
    pub cache_ttl_seconds: u64,

    /// Maximum cached (tenant, days) reports
    pub cache_capacity: u64,

    /// Average tokens per request above which a recommendation is emitted
    pub high_tokens_per_request: f64,

    /// Cost share (0-100) above which a single model is flagged
    pub dominant_model_share_percent: f64,

    /// Longest report window; larger requests are clamped to this
    pub max_window_days: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 300,
            cache_capacity: 1_000,
            high_tokens_per_request: 2_000.0,
            dominant_model_share_percent: 60.0,
            max_window_days: 366,
        }
    }
}

impl AnalyticsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.cache_capacity == 0 {
            return Err("cache_capacity must be >= 1".to_string());
        }
        if self.max_window_days == 0 {
            return Err("max_window_days must be >= 1".to_string());
        }
        if !(0.0..=100.0).contains(&self.dominant_model_share_percent) {
            return Err("dominant_model_share_percent must be 0-100".to_string());
        }
        Ok(())
    }
}
