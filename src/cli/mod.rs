//! CLI module for Tollgate
//!
//! Command-line interface definitions and handlers.
//!
//! # Commands
//!
//! - `catalog` - Show tier quotas and model pricing
//! - `estimate` - Estimate the cost of a request before sending it
//! - `simulate` - Run concurrent tasks through the engine with in-process adapters
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # What does 2,000 tokens on gpt-4 cost?
//! tollgate estimate --model gpt-4 --tokens 2000
//!
//! # Push 50 tasks through two free-tier tenants
//! tollgate simulate --tasks 50 --tenants 2 --tier free
//!
//! # Generate shell completions
//! tollgate completions bash > ~/.bash_completion.d/tollgate
//! ```

pub mod catalog;
pub mod completions;
pub mod config;
pub mod estimate;
pub mod output;
pub mod simulate;

pub use catalog::{handle_pricing, handle_tiers};
pub use completions::handle_completions;
pub use config::handle_config_init;
pub use estimate::handle_estimate;
pub use simulate::handle_simulate;

use crate::catalog::Tier;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Tollgate - AI request orchestration and cost governance
#[derive(Parser, Debug)]
#[command(
    name = "tollgate",
    version,
    about = "AI request orchestration and cost governance engine"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show tier quotas and model pricing
    #[command(subcommand)]
    Catalog(CatalogCommands),
    /// Estimate the cost of a request
    Estimate(EstimateArgs),
    /// Run simulated tasks through the full engine
    Simulate(SimulateArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Subcommand, Debug)]
pub enum CatalogCommands {
    /// List subscription tiers and their daily limits
    Tiers(CatalogArgs),
    /// List per-model pricing
    Pricing(CatalogArgs),
}

#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct EstimateArgs {
    /// Model to price against (unknown models use default pricing)
    #[arg(short, long, default_value = "gpt-4")]
    pub model: String,

    /// Total tokens expected for the request
    #[arg(short, long)]
    pub tokens: u64,

    /// Show the estimate as a share of this tier's daily budget
    #[arg(long)]
    pub tier: Option<Tier>,

    /// Path to configuration file
    #[arg(short, long, default_value = "tollgate.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "tollgate.toml")]
    pub config: PathBuf,

    /// Number of tasks to submit
    #[arg(short = 'n', long, default_value = "20")]
    pub tasks: usize,

    /// Number of tenants to spread tasks over
    #[arg(long, default_value = "3")]
    pub tenants: usize,

    /// Tier assigned to every simulated tenant
    #[arg(long, default_value = "free")]
    pub tier: Tier,

    /// Simulated provider latency in milliseconds
    #[arg(long, default_value = "0")]
    pub latency_ms: u64,

    /// Make every Nth provider call fail with a rate-limit error
    #[arg(long)]
    pub throttle_every: Option<u64>,

    /// Override retry base delay (milliseconds)
    #[arg(long, env = "TOLLGATE_BASE_DELAY_MS")]
    pub base_delay_ms: Option<u64>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "TOLLGATE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "tollgate.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
