//! Property tests for ledger accounting.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;
use tokio_test::assert_ok;
use tollgate::alerting::{AlertEngine, TracingNotifier};
use tollgate::catalog::{PricingTable, Tier};
use tollgate::clock::ManualClock;
use tollgate::config::{AlertConfig, LedgerConfig};
use tollgate::ledger::BudgetLedger;
use tollgate::provider::{ProviderResponse, TokenUsage};
use tollgate::task::TaskType;

fn ledger(tier: Tier) -> BudgetLedger {
    let alerts = Arc::new(AlertEngine::new(
        AlertConfig::default().rules,
        Arc::new(TracingNotifier),
    ));
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    ));
    let ledger = BudgetLedger::new(LedgerConfig::default(), PricingTable::new(), alerts, clock);
    ledger.assign_tier("acme", tier);
    ledger
}

fn response(model: &str, prompt: u32, completion: u32) -> ProviderResponse {
    ProviderResponse {
        content: String::new(),
        model: model.to_string(),
        usage: TokenUsage::new(prompt, completion),
    }
}

const MODELS: [&str; 5] = ["gpt-4", "gpt-4o", "gpt-4o-mini", "claude-3-sonnet", "unpriced-model"];

proptest! {
    #[test]
    fn cost_grows_with_tokens(
        model in prop::sample::select(MODELS.to_vec()),
        prompt in 0u32..200_000,
        completion in 0u32..200_000,
        extra in 1u32..10_000,
    ) {
        let ledger = ledger(Tier::Pro);
        let base = ledger.calculate_cost(&response(model, prompt, completion));
        prop_assert!(base >= 0.0);
        prop_assert!(ledger.calculate_cost(&response(model, prompt + extra, completion)) >= base);
        prop_assert!(ledger.calculate_cost(&response(model, prompt, completion + extra)) >= base);
    }

    #[test]
    fn bucket_totals_equal_sum_of_records(
        records in prop::collection::vec(
            (prop::sample::select(MODELS.to_vec()), 1u32..5_000, 1u32..5_000),
            1..40,
        ),
    ) {
        let ledger = ledger(Tier::Enterprise);
        let mut cost = 0.0;
        let mut tokens = 0u64;
        for (model, prompt, completion) in &records {
            let resp = response(model, *prompt, *completion);
            let charge = ledger.calculate_cost(&resp);
            cost += charge;
            tokens += resp.tokens_used();
            let _ = ledger.track_usage("acme", &resp, charge, TaskType::Content);
        }

        let bucket = ledger.usage_today("acme").unwrap();
        prop_assert_eq!(bucket.request_count, records.len() as u64);
        prop_assert_eq!(bucket.total_tokens, tokens);
        prop_assert!((bucket.total_cost - cost).abs() < 1e-6);

        let by_model_requests: u64 = bucket.by_model.values().map(|a| a.requests).sum();
        let by_task_tokens: u64 = bucket.by_task_type.values().map(|a| a.tokens).sum();
        prop_assert_eq!(by_model_requests, bucket.request_count);
        prop_assert_eq!(by_task_tokens, bucket.total_tokens);
    }

    #[test]
    fn reservations_never_overshoot_limits(
        estimates in prop::collection::vec(1u64..20_000, 1..200),
        tier in prop::sample::select(Tier::ALL.to_vec()),
    ) {
        let ledger = ledger(tier);
        let limits = tier.definition();
        let mut held = Vec::new();

        for tokens in estimates {
            if let Ok(reservation) = ledger.reserve("acme", tokens, "gpt-4") {
                held.push(reservation);
            }
        }

        let cost: f64 = held.iter().map(|r| r.estimated_cost()).sum();
        let tokens: u64 = held.iter().map(|r| r.estimated_tokens()).sum();
        prop_assert!(cost <= limits.daily_cost_limit + 1e-6);
        prop_assert!(tokens <= limits.daily_token_limit);
        prop_assert!(held.len() as u64 <= limits.daily_request_limit);

        drop(held);
        let remaining = ledger.remaining_budget("acme");
        prop_assert_eq!(remaining.tokens, limits.daily_token_limit);
        prop_assert_eq!(remaining.requests, limits.daily_request_limit);
    }
}

#[test]
fn committing_reservations_matches_direct_tracking() {
    let reserved = ledger(Tier::Free);
    let direct = ledger(Tier::Free);

    for (prompt, completion) in [(120, 80), (900, 300), (45, 10)] {
        let resp = response("gpt-4o-mini", prompt, completion);
        let cost = reserved.calculate_cost(&resp);

        let reservation = assert_ok!(reserved.reserve("acme", 2_000, "gpt-4o-mini"));
        assert_ok!(reserved.commit(reservation, &resp, cost, TaskType::CustomerReply));
        assert_ok!(direct.track_usage("acme", &resp, cost, TaskType::CustomerReply));
    }

    assert_eq!(reserved.usage_today("acme"), direct.usage_today("acme"));
    assert_eq!(reserved.remaining_budget("acme"), direct.remaining_budget("acme"));
}
