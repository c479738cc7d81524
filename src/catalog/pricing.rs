//! Cost estimation for generative-AI models.
//!
//! Pricing data is hardcoded and must be manually updated when providers
//! change their rates.
//!
//! ## Pricing Strategy
//!
//! - **Input tokens**: charged at per-1K-token rate for prompt/context
//! - **Output tokens**: charged at per-1K-token rate for completion
//! - **Total cost**: `(input_tokens/1000 * input_rate) + (output_tokens/1000 * output_rate)`,
//!   rounded to 6 decimal places
//!
//! Models missing from the table are billed at [`DEFAULT_PRICING`].
//!
//! ## Example
//!
//! ```rust
//! use tollgate::catalog::PricingTable;
//!
//! let pricing = PricingTable::new();
//! let cost = pricing.cost("gpt-4", 1000, 500);
//! assert_eq!(cost, 0.06); // $0.03/1K input + $0.06/1K output
//! ```

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Pricing for a specific model (input and output rates).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelPricing {
    /// Input (prompt) cost in USD per 1K tokens.
    pub input_price_per_1k: f64,

    /// Output (completion) cost in USD per 1K tokens.
    pub output_price_per_1k: f64,
}

impl ModelPricing {
    pub const fn new(input_price_per_1k: f64, output_price_per_1k: f64) -> Self {
        Self {
            input_price_per_1k,
            output_price_per_1k,
        }
    }

    /// Exact cost for the given token counts, rounded to 6 decimals.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let input_cost = (input_tokens as f64 / 1000.0) * self.input_price_per_1k;
        let output_cost = (output_tokens as f64 / 1000.0) * self.output_price_per_1k;
        round_usd(input_cost + output_cost)
    }
}

/// Rates applied to any model not present in the table.
///
/// Matches the gpt-4 rate so unknown models are never under-billed.
pub const DEFAULT_PRICING: ModelPricing = ModelPricing::new(0.03, 0.06);

/// Round a USD amount to 6 decimal places.
pub fn round_usd(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Pricing table for all supported models.
///
/// Initialized once at startup and shared across the engine.
#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: Arc<HashMap<String, ModelPricing>>,
}

impl PricingTable {
    pub fn new() -> Self {
        let mut prices = HashMap::new();

        // OpenAI
        prices.insert("gpt-4".to_string(), ModelPricing::new(0.03, 0.06));
        prices.insert("gpt-4-turbo".to_string(), ModelPricing::new(0.01, 0.03));
        prices.insert("gpt-4o".to_string(), ModelPricing::new(0.005, 0.015));
        prices.insert("gpt-4o-mini".to_string(), ModelPricing::new(0.00015, 0.0006));
        prices.insert(
            "gpt-3.5-turbo".to_string(),
            ModelPricing::new(0.0005, 0.0015),
        );

        // Anthropic
        prices.insert("claude-3-opus".to_string(), ModelPricing::new(0.015, 0.075));
        prices.insert(
            "claude-3-sonnet".to_string(),
            ModelPricing::new(0.003, 0.015),
        );
        prices.insert(
            "claude-3-haiku".to_string(),
            ModelPricing::new(0.00025, 0.00125),
        );

        Self {
            prices: Arc::new(prices),
        }
    }

    /// Build a table from explicit entries (tests, custom deployments).
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, ModelPricing)>,
    {
        Self {
            prices: Arc::new(entries.into_iter().collect()),
        }
    }

    /// Pricing for a model, falling back to [`DEFAULT_PRICING`].
    pub fn pricing_for(&self, model: &str) -> ModelPricing {
        self.prices.get(model).copied().unwrap_or(DEFAULT_PRICING)
    }

    /// Check if a model has its own pricing entry.
    pub fn has_pricing(&self, model: &str) -> bool {
        self.prices.contains_key(model)
    }

    /// Cost in USD for the given token counts.
    pub fn cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        self.pricing_for(model).cost(input_tokens, output_tokens)
    }

    /// All entries sorted by model name
    pub fn entries(&self) -> Vec<(String, ModelPricing)> {
        let mut entries: Vec<_> = self
            .prices
            .iter()
            .map(|(model, pricing)| (model.clone(), *pricing))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::new()
    }
}
