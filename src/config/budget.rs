//! Budget ledger and alert configuration

use crate::alerting::AlertType;
use crate::catalog::Tier;
use serde::{Deserialize, Serialize};

/// Budget ledger configuration
///
/// # Example
///
/// ```toml
/// [ledger]
/// default_tier = "free"
/// history_capacity = 10000
/// estimate_input_share = 0.7
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Tier applied to tenants with no explicit assignment
    pub default_tier: Tier,

    /// Maximum usage snapshots retained (oldest evicted first)
    pub history_capacity: usize,

    /// Fraction of estimated tokens priced as input (rest priced as output)
    pub estimate_input_share: f64,

    /// Add the prompt's max_tokens to the pre-flight token estimate
    pub estimate_output_reserve: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_tier: Tier::Free,
            history_capacity: 10_000,
            estimate_input_share: 0.7,
            estimate_output_reserve: true,
        }
    }
}

impl LedgerConfig {
    /// Validate configuration at startup
    pub fn validate(&self) -> Result<(), String> {
        if self.history_capacity == 0 {
            return Err("history_capacity must be >= 1".to_string());
        }

        if !(self.estimate_input_share > 0.0 && self.estimate_input_share < 1.0) {
            return Err("estimate_input_share must be between 0 and 1 (exclusive)".to_string());
        }

        Ok(())
    }
}

/// One usage threshold that raises an alert when crossed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub alert_type: AlertType,
    /// Percentage of the tightest daily limit (0-100]
    pub threshold_percent: f64,
}

impl AlertRule {
    pub fn new(alert_type: AlertType, threshold_percent: f64) -> Self {
        Self {
            alert_type,
            threshold_percent,
        }
    }
}

/// Default alert thresholds applied to every tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub rules: Vec<AlertRule>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                AlertRule::new(AlertType::Warning, 75.0),
                AlertRule::new(AlertType::Critical, 90.0),
                AlertRule::new(AlertType::LimitReached, 100.0),
            ],
        }
    }
}

impl AlertConfig {
    pub fn validate(&self) -> Result<(), String> {
        for rule in &self.rules {
            if !(rule.threshold_percent > 0.0 && rule.threshold_percent <= 100.0) {
                return Err(format!(
                    "threshold_percent for {} must be in (0, 100]",
                    rule.alert_type
                ));
            }
        }
        Ok(())
    }
}
