//! Usage analytics - trend and efficiency reports over the ledger's day buckets
//!
//! Reports are cached per `(tenant, days)` for `cache_ttl_seconds` so that
//! dashboards polling the same window don't recompute it. New usage is not
//! reflected until the entry expires or [`UsageAnalytics::invalidate`] is
//! called.

use crate::catalog::{round_usd, Tier};
use crate::ledger::{BudgetLedger, UsageAggregate};
use crate::config::AnalyticsConfig;
use crate::dispatch::DEFAULT_MODEL;
use crate::task::TaskType;
use chrono::{DateTime, Days, NaiveDate, Utc};
use moka::sync::Cache;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-model totals with the model's share of spend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelUsage {
    pub cost: f64,
    pub tokens: u64,
    pub requests: u64,
    /// Percent of the period's total cost
    pub cost_share_percent: f64,
}

/// Totals for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub cost: f64,
    pub tokens: u64,
    pub requests: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub tenant_id: String,
    pub period_days: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub total_requests: u64,
    pub avg_cost_per_request: f64,
    pub avg_tokens_per_request: f64,
    pub cost_per_1k_tokens: f64,
    pub by_model: BTreeMap<String, ModelUsage>,
    pub by_task_type: BTreeMap<TaskType, UsageAggregate>,
    /// One entry per day in the period, oldest first, zero-filled
    pub daily: Vec<DailyUsage>,
    pub tier: Tier,
    /// Today's tightest-limit usage against the tenant's tier
    pub tier_utilization_percent: f64,
    pub recommendations: Vec<String>,
}

impl UsageReport {
    /// Model with the highest spend in the period
    pub fn most_expensive_model(&self) -> Option<(&str, &ModelUsage)> {
        self.by_model
            .iter()
            .max_by(|a, b| a.1.cost.total_cmp(&b.1.cost))
            .map(|(model, usage)| (model.as_str(), usage))
    }
}

/// Cached report builder over a shared [`BudgetLedger`].
pub struct UsageAnalytics {
    ledger: Arc<BudgetLedger>,
    config: AnalyticsConfig,
    cache: Cache<(String, u32), Arc<UsageReport>>,
}

impl UsageAnalytics {
    pub fn new(ledger: Arc<BudgetLedger>, config: AnalyticsConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(config.cache_ttl())
            .build();
        Self {
            ledger,
            config,
            cache,
        }
    }

    /// Report covering `[today - days, today]`.
    ///
    /// `days` is clamped to `max_window_days`.
    pub fn get_usage_analytics(&self, tenant_id: &str, days: u32) -> Arc<UsageReport> {
        let days = days.min(self.config.max_window_days);
        self.cache.get_with((tenant_id.to_string(), days), || {
            tracing::debug!(tenant_id, days, "Computing usage analytics");
            Arc::new(self.compute(tenant_id, days))
        })
    }

    /// Drop every cached report for a tenant.
    pub fn invalidate(&self, tenant_id: &str) {
        let stale: Vec<(String, u32)> = self
            .cache
            .iter()
            .filter(|(key, _)| key.0 == tenant_id)
            .map(|(key, _)| (*key).clone())
            .collect();
        for key in stale {
            self.cache.invalidate(&key);
        }
    }

    fn compute(&self, tenant_id: &str, days: u32) -> UsageReport {
        let clock = self.ledger.clock();
        let end_date = clock.today();
        let start_date = end_date
            .checked_sub_days(Days::new(days.into()))
            .unwrap_or(NaiveDate::MIN);
        let buckets = self.ledger.buckets_between(tenant_id, start_date, end_date);

        let mut totals = UsageAggregate::default();
        let mut models: BTreeMap<String, UsageAggregate> = BTreeMap::new();
        let mut by_task_type: BTreeMap<TaskType, UsageAggregate> = BTreeMap::new();
        let mut per_day: BTreeMap<NaiveDate, UsageAggregate> = BTreeMap::new();

        for bucket in &buckets {
            for (model, usage) in &bucket.by_model {
                models.entry(model.clone()).or_default().merge(usage);
                totals.merge(usage);
            }
            for (task_type, usage) in &bucket.by_task_type {
                by_task_type.entry(*task_type).or_default().merge(usage);
            }
            per_day.insert(bucket.day, bucket.model_totals());
        }

        let total_cost = round_usd(totals.cost);
        let by_model = models
            .into_iter()
            .map(|(model, usage)| {
                let cost_share_percent = if totals.cost > 0.0 {
                    usage.cost / totals.cost * 100.0
                } else {
                    0.0
                };
                let entry = ModelUsage {
                    cost: round_usd(usage.cost),
                    tokens: usage.tokens,
                    requests: usage.requests,
                    cost_share_percent,
                };
                (model, entry)
            })
            .collect();

        let daily = start_date
            .iter_days()
            .take_while(|date| *date <= end_date)
            .map(|date| {
                let usage = per_day.get(&date).copied().unwrap_or_default();
                DailyUsage {
                    date,
                    cost: round_usd(usage.cost),
                    tokens: usage.tokens,
                    requests: usage.requests,
                }
            })
            .collect();

        let (avg_cost_per_request, avg_tokens_per_request) = if totals.requests > 0 {
            (
                round_usd(totals.cost / totals.requests as f64),
                totals.tokens as f64 / totals.requests as f64,
            )
        } else {
            (0.0, 0.0)
        };
        let cost_per_1k_tokens = if totals.tokens > 0 {
            round_usd(totals.cost / totals.tokens as f64 * 1000.0)
        } else {
            0.0
        };

        let tier = self.ledger.tier_of(tenant_id);
        let tier_utilization_percent = self
            .ledger
            .usage_today(tenant_id)
            .map(|bucket| bucket.usage_percent(tier.definition()).max())
            .unwrap_or(0.0);

        let mut report = UsageReport {
            tenant_id: tenant_id.to_string(),
            period_days: days,
            start_date,
            end_date,
            generated_at: clock.now(),
            total_cost,
            total_tokens: totals.tokens,
            total_requests: totals.requests,
            avg_cost_per_request,
            avg_tokens_per_request,
            cost_per_1k_tokens,
            by_model,
            by_task_type,
            daily,
            tier,
            tier_utilization_percent,
            recommendations: Vec::new(),
        };
        report.recommendations = self.recommend(&report);
        report
    }

    fn recommend(&self, report: &UsageReport) -> Vec<String> {
        if report.total_requests == 0 {
            return vec![format!(
                "No usage yet in the last {} days. Start with low-priority tasks, which run on {}, to keep early costs down.",
                report.period_days, DEFAULT_MODEL
            )];
        }

        let mut recommendations = Vec::new();

        if let Some((model, usage)) = report.most_expensive_model() {
            if usage.cost_share_percent >= self.config.dominant_model_share_percent
                && report.by_model.len() > 1
            {
                recommendations.push(format!(
                    "{} accounts for {:.1}% of spend. Route low-priority tasks to a cheaper model to cut costs.",
                    model, usage.cost_share_percent
                ));
            } else if usage.cost > 0.0 {
                recommendations.push(format!(
                    "Most expensive model is {} (${:.2} over {} requests).",
                    model, usage.cost, usage.requests
                ));
            }
        }

        if report.avg_tokens_per_request > self.config.high_tokens_per_request {
            recommendations.push(format!(
                "Average request uses {:.0} tokens. Shorter prompts or a lower max_tokens would reduce cost.",
                report.avg_tokens_per_request
            ));
        }

        if report.tier_utilization_percent >= 80.0 && report.tier != Tier::Enterprise {
            recommendations.push(format!(
                "Today's usage is at {:.1}% of the {} tier limit. Consider upgrading to avoid interruptions.",
                report.tier_utilization_percent, report.tier
            ));
        }

        if recommendations.is_empty() {
            recommendations.push("Usage is within expected ranges.".to_string());
        }
        recommendations
    }
}
