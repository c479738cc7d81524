//! Simulate command handler
//!
//! Wires the engine to the in-process adapters and pushes a batch of
//! concurrent tasks through it, then reports per-tenant usage.

use super::estimate::load_config;
use super::output::{format_json, format_usage_table, TenantUsageView};
use super::SimulateArgs;
use crate::alerting::TracingNotifier;
use crate::analytics::UsageAnalytics;
use crate::clock::SystemClock;
use crate::config::TollgateConfig;
use crate::error::EngineError;
use crate::simulation::{
    JsonSchemaValidator, KeywordSafetyValidator, MemoryInteractionLog, SimulatedProvider,
    StaticTenantDirectory, TemplatePromptBuilder,
};
use crate::task::handler::Collaborators;
use crate::task::{EngineContext, Priority, TaskRequest, TaskType};
use anyhow::bail;
use futures::future::join_all;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Build the `index`-th simulated request
fn simulated_request(ctx: &EngineContext, index: usize, tenant_id: &str) -> TaskRequest {
    let task_type = TaskType::ALL[index % TaskType::ALL.len()];
    let priority = Priority::ALL[(index / TaskType::ALL.len()) % Priority::ALL.len()];
    let request = ctx
        .request(task_type, tenant_id, format!("user-{}", index % 7))
        .with_priority(priority);

    match task_type {
        TaskType::CustomerReply => request.with_parameter(
            "message",
            "Hi, my order arrived late. Can I get a discount on the next one?",
        ),
        TaskType::AnalyticsInsight => request.with_parameter(
            "metrics",
            json!({ "impressions": 12_000 + index * 10, "clicks": 340, "conversions": 21 }),
        ),
        TaskType::Content => request.with_parameter("platform", "instagram"),
        TaskType::Strategy | TaskType::VideoScript => request,
    }
}

#[derive(Default)]
struct Tally {
    succeeded: usize,
    failed: usize,
    rejected: usize,
}

/// Run the simulation and return the engine context with per-tenant tallies
async fn run(
    config: &TollgateConfig,
    args: &SimulateArgs,
) -> (Arc<EngineContext>, BTreeMap<String, Tally>) {
    let mut directory = StaticTenantDirectory::new();
    let tenant_ids: Vec<String> = (1..=args.tenants).map(|i| format!("tenant-{i}")).collect();
    for (i, tenant_id) in tenant_ids.iter().enumerate() {
        directory = directory.with_tenant(tenant_id, &format!("Simulated Business {}", i + 1), args.tier);
    }

    let mut provider = SimulatedProvider::new(Duration::from_millis(args.latency_ms));
    if let Some(every) = args.throttle_every {
        provider = provider.with_throttling(every);
    }

    let collaborators = Collaborators {
        tenants: Arc::new(directory),
        prompts: Arc::new(TemplatePromptBuilder),
        safety: Arc::new(KeywordSafetyValidator::new(["guaranteed returns", "miracle cure"])),
        schemas: Arc::new(JsonSchemaValidator),
        interactions: Arc::new(MemoryInteractionLog::new()),
    };
    let ctx = Arc::new(EngineContext::from_config(
        config,
        Arc::new(provider),
        collaborators,
        Arc::new(TracingNotifier),
        Arc::new(SystemClock),
    ));

    let runs = (0..args.tasks).map(|index| {
        let tenant_id = tenant_ids[index % tenant_ids.len()].clone();
        let request = simulated_request(&ctx, index, &tenant_id);
        let handler = ctx.handler(request.task_type);
        async move { (tenant_id, handler.handle(request).await) }
    });

    let mut tallies: BTreeMap<String, Tally> = tenant_ids
        .iter()
        .map(|id| (id.clone(), Tally::default()))
        .collect();
    for (tenant_id, outcome) in join_all(runs).await {
        let tally = tallies.entry(tenant_id).or_default();
        match outcome {
            Ok(result) if result.success => tally.succeeded += 1,
            Ok(_) => tally.failed += 1,
            Err(EngineError::QuotaExceeded { .. }) => tally.rejected += 1,
            Err(err) => {
                tracing::warn!(error = %err, "Simulated task refused");
                tally.failed += 1;
            }
        }
    }

    (ctx, tallies)
}

/// Handle `tollgate simulate`
pub async fn handle_simulate(args: &SimulateArgs) -> anyhow::Result<String> {
    if args.tenants == 0 {
        bail!("--tenants must be at least 1");
    }

    let mut config = load_config(&args.config)?;
    if let Some(delay) = args.base_delay_ms {
        config.retry.base_delay_ms = delay;
        config.retry.max_delay_ms = config.retry.max_delay_ms.max(delay);
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Err(e) = crate::logging::init_tracing(&config.logging) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    let (ctx, tallies) = run(&config, args).await;
    let analytics = UsageAnalytics::new(Arc::clone(&ctx.ledger), config.analytics.clone());

    let rows: Vec<TenantUsageView> = tallies
        .into_iter()
        .map(|(tenant_id, tally)| {
            let report = analytics.get_usage_analytics(&tenant_id, 0);
            let remaining = ctx.ledger.remaining_budget(&tenant_id);
            TenantUsageView {
                tier: report.tier,
                succeeded: tally.succeeded,
                failed: tally.failed,
                rejected: tally.rejected,
                requests: report.total_requests,
                tokens: report.total_tokens,
                cost: report.total_cost,
                remaining_cost: remaining.cost,
                utilization_percent: report.tier_utilization_percent,
                tenant_id,
            }
        })
        .collect();

    if args.json {
        return Ok(format_json("tenants", &rows)?);
    }

    let total_cost: f64 = rows.iter().map(|r| r.cost).sum();
    let total_ok: usize = rows.iter().map(|r| r.succeeded).sum();
    Ok(format!(
        "{}\n{} of {} tasks succeeded, total cost ${:.6}",
        format_usage_table(&rows),
        total_ok,
        args.tasks,
        total_cost
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(tasks: usize, tenants: usize) -> SimulateArgs {
        SimulateArgs {
            config: PathBuf::from("does-not-exist.toml"),
            tasks,
            tenants,
            tier: crate::catalog::Tier::Pro,
            latency_ms: 0,
            throttle_every: None,
            base_delay_ms: Some(1),
            log_level: Some("error".to_string()),
            json: true,
        }
    }

    #[tokio::test]
    async fn requests_cover_every_task_type() {
        let mut config = TollgateConfig::default();
        config.retry.max_retries = 1;
        let (ctx, _) = run(&config, &args(0, 1)).await;

        let types: std::collections::HashSet<_> =
            (0..5).map(|i| simulated_request(&ctx, i, "t").task_type).collect();
        assert_eq!(types.len(), 5);
        let reply = simulated_request(&ctx, 4, "t");
        assert!(reply.parameter_str("message").is_some());
        assert_eq!(reply.max_retries, 1);
    }

    #[tokio::test]
    async fn all_tasks_accounted_for() {
        let a = args(10, 2);
        let config = TollgateConfig::default();
        let (ctx, tallies) = run(&config, &a).await;

        let total: usize = tallies
            .values()
            .map(|t| t.succeeded + t.failed + t.rejected)
            .sum();
        assert_eq!(total, 10);
        let recorded: u64 = ["tenant-1", "tenant-2"]
            .iter()
            .filter_map(|id| ctx.ledger.usage_today(id))
            .map(|bucket| bucket.request_count)
            .sum();
        let succeeded: usize = tallies.values().map(|t| t.succeeded).sum();
        assert_eq!(recorded, succeeded as u64);
    }

    #[tokio::test]
    async fn zero_tenants_is_an_error() {
        assert!(handle_simulate(&args(1, 0)).await.is_err());
    }
}
