//! Output formatting helpers for CLI commands

use crate::catalog::{ModelPricing, Tier, DEFAULT_PRICING};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;

/// View model for tier display
#[derive(Debug, Clone, Serialize)]
pub struct TierView {
    pub tier: Tier,
    pub daily_cost_limit: f64,
    pub daily_token_limit: u64,
    pub daily_request_limit: u64,
    pub max_concurrent_requests: u32,
    pub priority_label: &'static str,
}

impl From<Tier> for TierView {
    fn from(tier: Tier) -> Self {
        let def = tier.definition();
        Self {
            tier,
            daily_cost_limit: def.daily_cost_limit,
            daily_token_limit: def.daily_token_limit,
            daily_request_limit: def.daily_request_limit,
            max_concurrent_requests: def.max_concurrent_requests,
            priority_label: def.priority_label,
        }
    }
}

/// View model for pricing display
#[derive(Debug, Clone, Serialize)]
pub struct PricingView {
    pub model: String,
    pub input_price_per_1k: f64,
    pub output_price_per_1k: f64,
}

impl PricingView {
    pub fn new(model: impl Into<String>, pricing: ModelPricing) -> Self {
        Self {
            model: model.into(),
            input_price_per_1k: pricing.input_price_per_1k,
            output_price_per_1k: pricing.output_price_per_1k,
        }
    }
}

/// View model for one tenant's simulated usage
#[derive(Debug, Clone, Serialize)]
pub struct TenantUsageView {
    pub tenant_id: String,
    pub tier: Tier,
    pub succeeded: usize,
    pub failed: usize,
    pub rejected: usize,
    pub requests: u64,
    pub tokens: u64,
    pub cost: f64,
    pub remaining_cost: f64,
    pub utilization_percent: f64,
}

/// Format tiers as a table
pub fn format_tiers_table(tiers: &[TierView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Tier",
        "Daily Cost",
        "Daily Tokens",
        "Daily Requests",
        "Concurrent",
        "Priority",
    ]);

    for t in tiers {
        table.add_row(vec![
            Cell::new(t.tier.as_str().bold().to_string()),
            Cell::new(format!("${:.2}", t.daily_cost_limit)),
            Cell::new(t.daily_token_limit),
            Cell::new(t.daily_request_limit),
            Cell::new(t.max_concurrent_requests),
            Cell::new(t.priority_label),
        ]);
    }

    table.to_string()
}

/// Format pricing as a table, with the fallback entry last
pub fn format_pricing_table(prices: &[PricingView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Model", "Input / 1K", "Output / 1K"]);

    for p in prices {
        table.add_row(vec![
            Cell::new(&p.model),
            Cell::new(format!("${:.5}", p.input_price_per_1k)),
            Cell::new(format!("${:.5}", p.output_price_per_1k)),
        ]);
    }
    table.add_row(vec![
        Cell::new("(other models)".dimmed().to_string()),
        Cell::new(format!("${:.5}", DEFAULT_PRICING.input_price_per_1k)),
        Cell::new(format!("${:.5}", DEFAULT_PRICING.output_price_per_1k)),
    ]);

    table.to_string()
}

/// Format simulated tenant usage as a table
pub fn format_usage_table(rows: &[TenantUsageView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Tenant", "Tier", "OK", "Failed", "Rejected", "Tokens", "Cost", "Remaining", "Usage",
    ]);

    for r in rows {
        table.add_row(vec![
            Cell::new(&r.tenant_id),
            Cell::new(r.tier),
            Cell::new(r.succeeded.to_string().green().to_string()),
            Cell::new(r.failed.to_string().red().to_string()),
            Cell::new(r.rejected.to_string().yellow().to_string()),
            Cell::new(r.tokens),
            Cell::new(format!("${:.6}", r.cost)),
            Cell::new(format!("${:.6}", r.remaining_cost)),
            Cell::new(utilization_label(r.utilization_percent)),
        ]);
    }

    table.to_string()
}

/// Usage percentage colored by how close it is to the limit
pub fn utilization_label(percent: f64) -> String {
    let text = format!("{:.1}%", percent);
    if percent >= 90.0 {
        text.red().to_string()
    } else if percent >= 75.0 {
        text.yellow().to_string()
    } else {
        text.green().to_string()
    }
}

/// Serialize any view as pretty JSON under `key`
pub fn format_json<T: Serialize + ?Sized>(key: &str, value: &T) -> serde_json::Result<String> {
    let mut root = serde_json::Map::new();
    root.insert(key.to_string(), serde_json::to_value(value)?);
    serde_json::to_string_pretty(&root)
}
