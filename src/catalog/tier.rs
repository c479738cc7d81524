//! Subscription tiers and their daily quotas.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subscription level of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

/// Daily limits for one tier. Immutable for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierDefinition {
    pub daily_cost_limit: f64,
    pub daily_token_limit: u64,
    pub daily_request_limit: u64,
    pub max_concurrent_requests: u32,
    pub priority_label: &'static str,
}

const FREE: TierDefinition = TierDefinition {
    daily_cost_limit: 10.0,
    daily_token_limit: 100_000,
    daily_request_limit: 100,
    max_concurrent_requests: 2,
    priority_label: "standard",
};

const PRO: TierDefinition = TierDefinition {
    daily_cost_limit: 100.0,
    daily_token_limit: 1_000_000,
    daily_request_limit: 1_000,
    max_concurrent_requests: 10,
    priority_label: "high",
};

const ENTERPRISE: TierDefinition = TierDefinition {
    daily_cost_limit: 1_000.0,
    daily_token_limit: 10_000_000,
    daily_request_limit: 10_000,
    max_concurrent_requests: 50,
    priority_label: "critical",
};

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Pro, Tier::Enterprise];

    /// Quota limits for this tier
    pub fn definition(&self) -> &'static TierDefinition {
        match self {
            Tier::Free => &FREE,
            Tier::Pro => &PRO,
            Tier::Enterprise => &ENTERPRISE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "pro" => Ok(Tier::Pro),
            "enterprise" => Ok(Tier::Enterprise),
            _ => Err(format!("Invalid tier: {}", s)),
        }
    }
}
