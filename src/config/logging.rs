//! Logging configuration
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [logging.component_levels]
//! dispatch = "debug"
//! ledger = "trace"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Modules that accept a per-component level
pub const COMPONENTS: [&str; 8] = [
    "alerting",
    "analytics",
    "cli",
    "dispatch",
    "ledger",
    "logging",
    "simulation",
    "task",
];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Level overrides keyed by component, e.g. `dispatch = "debug"`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub component_levels: BTreeMap<String, String>,
    /// Log truncated prompt previews. Prompts carry tenant business data.
    pub enable_content_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            component_levels: BTreeMap::new(),
            enable_content_logging: false,
        }
    }
}

fn check_level(level: &str) -> Result<(), String> {
    tracing::Level::from_str(level.trim())
        .map(|_| ())
        .map_err(|_| format!("unknown log level '{}'", level))
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), String> {
        check_level(&self.level)?;
        for (component, level) in &self.component_levels {
            if !COMPONENTS.contains(&component.as_str()) {
                return Err(format!(
                    "unknown component '{}' (expected one of: {})",
                    component,
                    COMPONENTS.join(", ")
                ));
            }
            check_level(level)?;
        }
        Ok(())
    }
}
