//! Estimate command handler

use super::output::utilization_label;
use super::EstimateArgs;
use crate::alerting::{AlertEngine, TracingNotifier};
use crate::catalog::PricingTable;
use crate::clock::SystemClock;
use crate::config::TollgateConfig;
use crate::ledger::BudgetLedger;
use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct EstimateView {
    model: String,
    priced: bool,
    tokens: u64,
    input_tokens: u64,
    output_tokens: u64,
    estimated_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    tier_budget_percent: Option<f64>,
}

/// Load config from `path` if it exists, defaults otherwise, then apply env.
pub(crate) fn load_config(path: &std::path::Path) -> anyhow::Result<TollgateConfig> {
    let config = if path.exists() {
        TollgateConfig::load(Some(path))
            .with_context(|| format!("failed to load {}", path.display()))?
    } else {
        TollgateConfig::default()
    };
    let config = config.with_env_overrides();
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Handle `tollgate estimate`
pub fn handle_estimate(args: &EstimateArgs) -> anyhow::Result<String> {
    let config = load_config(&args.config)?;
    let pricing = PricingTable::new();
    let priced = pricing.has_pricing(&args.model);
    let alerts = Arc::new(AlertEngine::new(
        config.alerts.rules.clone(),
        Arc::new(TracingNotifier),
    ));
    let ledger = BudgetLedger::new(config.ledger, pricing, alerts, Arc::new(SystemClock));

    let (input_tokens, output_tokens) = ledger.estimate_split(args.tokens);
    let estimated_cost = ledger.estimate_cost(args.tokens, &args.model);
    let tier_budget_percent = args
        .tier
        .map(|tier| estimated_cost / tier.definition().daily_cost_limit * 100.0);

    let view = EstimateView {
        model: args.model.clone(),
        priced,
        tokens: args.tokens,
        input_tokens,
        output_tokens,
        estimated_cost,
        tier_budget_percent,
    };

    if args.json {
        return Ok(serde_json::to_string_pretty(&view)?);
    }

    let mut out = format!(
        "Estimated cost for {} tokens on {}: {}\n  {} input / {} output tokens",
        view.tokens,
        view.model.bold(),
        format!("${:.6}", view.estimated_cost).green(),
        view.input_tokens,
        view.output_tokens
    );
    if let (Some(tier), Some(percent)) = (args.tier, view.tier_budget_percent) {
        out.push_str(&format!(
            "\n  {} of the {} tier's daily budget",
            utilization_label(percent),
            tier
        ));
    }
    if !view.priced {
        out.push_str(&format!(
            "\n  {}",
            "No pricing entry for this model; default pricing applied".yellow()
        ));
    }
    Ok(out)
}
