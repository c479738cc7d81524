//! Structured logging setup
//!
//! Installs the global `tracing` subscriber and provides field helpers used
//! by the handlers when logging interactions.

pub mod fields;

pub use fields::{extract_tokens, truncate_prompt, truncate_string};

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter directives for `config`: the base level, then one
/// `tollgate::<component>=<level>` entry per override in component order.
///
/// # Examples
///
/// ```
/// use tollgate::config::LoggingConfig;
/// use tollgate::logging::build_filter_directives;
///
/// let mut config = LoggingConfig::default();
/// config
///     .component_levels
///     .insert("dispatch".to_string(), "debug".to_string());
///
/// assert_eq!(build_filter_directives(&config), "info,tollgate::dispatch=debug");
/// ```
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.level.trim().to_string();
    for (component, level) in &config.component_levels {
        filter_str.push_str(&format!(",tollgate::{}={}", component, level.trim()));
    }
    filter_str
}

/// Install the global subscriber. `RUST_LOG` takes precedence over config.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    if config.enable_content_logging {
        eprintln!("WARNING: Content logging is enabled. Prompt previews will be logged.");
        eprintln!("         Prompts may include tenant business data. Use only for debugging.");
    }

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}
