//! Benchmarks for the ledger hot paths.
//!
//! Every task pays for one estimate, one reserve and one commit.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use tollgate::alerting::{AlertEngine, TracingNotifier};
use tollgate::catalog::{PricingTable, Tier};
use tollgate::clock::SystemClock;
use tollgate::config::{AlertConfig, LedgerConfig};
use tollgate::ledger::BudgetLedger;
use tollgate::provider::{ProviderResponse, TokenUsage};
use tollgate::task::TaskType;

fn create_ledger(tenants: usize) -> BudgetLedger {
    let alerts = Arc::new(AlertEngine::new(
        AlertConfig::default().rules,
        Arc::new(TracingNotifier),
    ));
    let ledger = BudgetLedger::new(
        LedgerConfig::default(),
        PricingTable::new(),
        alerts,
        Arc::new(SystemClock),
    );
    for i in 0..tenants {
        ledger.assign_tier(&format!("tenant-{}", i), Tier::Enterprise);
    }
    ledger
}

fn bench_estimate_cost(c: &mut Criterion) {
    let ledger = create_ledger(1);
    c.bench_function("estimate_cost", |b| {
        b.iter(|| ledger.estimate_cost(black_box(1_500), black_box("gpt-4o")))
    });
}

fn bench_check_budget(c: &mut Criterion) {
    let ledger = create_ledger(100);
    c.bench_function("check_budget_before_request", |b| {
        b.iter(|| ledger.check_budget_before_request(black_box("tenant-42"), 1_500, "gpt-4o"))
    });
}

/// Full reserve-then-commit cycle. Swaps to a fresh ledger before the
/// enterprise request limit is reached.
fn bench_reserve_commit(c: &mut Criterion) {
    let response = ProviderResponse {
        content: String::new(),
        model: "gpt-4o-mini".to_string(),
        usage: TokenUsage::new(1, 1),
    };
    let limit = Tier::Enterprise.definition().daily_request_limit - 1;
    let mut ledger = create_ledger(1);
    let mut recorded = 0u64;

    c.bench_function("reserve_commit", |b| {
        b.iter(|| {
            if recorded == limit {
                ledger = create_ledger(1);
                recorded = 0;
            }
            let reservation = ledger
                .reserve("tenant-0", black_box(2), "gpt-4o-mini")
                .unwrap();
            let cost = ledger.calculate_cost(&response);
            let _ = ledger.commit(reservation, &response, cost, TaskType::CustomerReply);
            recorded += 1;
        })
    });
}

criterion_group!(
    benches,
    bench_estimate_cost,
    bench_check_budget,
    bench_reserve_commit
);
criterion_main!(benches);
