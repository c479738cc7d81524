//! Catalog command handlers

use super::output::{format_json, format_pricing_table, format_tiers_table, PricingView, TierView};
use super::CatalogArgs;
use crate::catalog::{PricingTable, Tier};

/// Handle `tollgate catalog tiers`
pub fn handle_tiers(args: &CatalogArgs) -> anyhow::Result<String> {
    let rows: Vec<TierView> = Tier::ALL.into_iter().map(TierView::from).collect();
    if args.json {
        Ok(format_json("tiers", &rows)?)
    } else {
        Ok(format_tiers_table(&rows))
    }
}

/// Handle `tollgate catalog pricing`
pub fn handle_pricing(args: &CatalogArgs) -> anyhow::Result<String> {
    let rows: Vec<PricingView> = PricingTable::new()
        .entries()
        .into_iter()
        .map(|(model, pricing)| PricingView::new(model, pricing))
        .collect();
    if args.json {
        Ok(format_json("pricing", &rows)?)
    } else {
        Ok(format_pricing_table(&rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_json_lists_all_tiers() {
        let output = handle_tiers(&CatalogArgs { json: true }).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        let tiers = parsed["tiers"].as_array().unwrap();
        assert_eq!(tiers.len(), 3);
        assert_eq!(tiers[0]["tier"], "free");
        assert_eq!(tiers[2]["daily_request_limit"], 10_000);
    }

    #[test]
    fn pricing_json_is_sorted() {
        let output = handle_pricing(&CatalogArgs { json: true }).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        let models: Vec<&str> = parsed["pricing"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["model"].as_str().unwrap())
            .collect();
        let mut sorted = models.clone();
        sorted.sort();
        assert_eq!(models, sorted);
        assert!(models.contains(&"gpt-4"));
    }
}
