//! Per-tenant, per-day usage counters.

use crate::catalog::TierDefinition;
use crate::task::TaskType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Cost, tokens and request count for one slice of usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UsageAggregate {
    pub cost: f64,
    pub tokens: u64,
    pub requests: u64,
}

impl UsageAggregate {
    pub(crate) fn add(&mut self, cost: f64, tokens: u64) {
        self.cost += cost;
        self.tokens += tokens;
        self.requests += 1;
    }

    pub(crate) fn merge(&mut self, other: &UsageAggregate) {
        self.cost += other.cost;
        self.tokens += other.tokens;
        self.requests += other.requests;
    }
}

/// Usage for one tenant on one calendar day (UTC).
///
/// `total_*` always equal the sum of the `by_model` sub-aggregates; both are
/// only ever updated together by [`UsageBucket::record`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageBucket {
    pub tenant_id: String,
    pub day: NaiveDate,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub request_count: u64,
    pub by_model: BTreeMap<String, UsageAggregate>,
    pub by_task_type: BTreeMap<TaskType, UsageAggregate>,
    pub first_request_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
}

/// Consumption of each daily limit, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsagePercent {
    pub cost: f64,
    pub tokens: f64,
    pub requests: f64,
}

impl UsagePercent {
    /// The tightest of the three limits
    pub fn max(&self) -> f64 {
        self.cost.max(self.tokens).max(self.requests)
    }
}

fn percent(used: f64, limit: f64) -> f64 {
    if limit <= 0.0 {
        return 100.0;
    }
    used / limit * 100.0
}

impl UsageBucket {
    pub fn new(tenant_id: impl Into<String>, day: NaiveDate) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            day,
            total_cost: 0.0,
            total_tokens: 0,
            request_count: 0,
            by_model: BTreeMap::new(),
            by_task_type: BTreeMap::new(),
            first_request_at: None,
            last_activity_at: None,
        }
    }

    pub(crate) fn record(
        &mut self,
        model: &str,
        task_type: TaskType,
        cost: f64,
        tokens: u64,
        at: DateTime<Utc>,
    ) {
        self.total_cost += cost;
        self.total_tokens += tokens;
        self.request_count += 1;

        self.by_model
            .entry(model.to_string())
            .or_default()
            .add(cost, tokens);
        self.by_task_type
            .entry(task_type)
            .or_default()
            .add(cost, tokens);

        self.first_request_at.get_or_insert(at);
        self.last_activity_at = Some(at);
    }

    pub fn usage_percent(&self, limits: &TierDefinition) -> UsagePercent {
        UsagePercent {
            cost: percent(self.total_cost, limits.daily_cost_limit),
            tokens: percent(self.total_tokens as f64, limits.daily_token_limit as f64),
            requests: percent(self.request_count as f64, limits.daily_request_limit as f64),
        }
    }

    /// Sum of the per-model sub-aggregates
    pub fn model_totals(&self) -> UsageAggregate {
        let mut total = UsageAggregate::default();
        for aggregate in self.by_model.values() {
            total.merge(aggregate);
        }
        total
    }

    pub fn is_empty(&self) -> bool {
        self.request_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Tier;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn record_updates_totals_and_breakdowns() {
        let mut bucket = UsageBucket::new("acme", day());
        let at = Utc::now();
        bucket.record("gpt-4", TaskType::Content, 0.25, 1000, at);
        bucket.record("gpt-4", TaskType::Strategy, 0.50, 2000, at);
        bucket.record("claude-3-haiku", TaskType::Content, 0.01, 500, at);

        assert_eq!(bucket.request_count, 3);
        assert_eq!(bucket.total_tokens, 3500);
        assert_eq!(bucket.by_model["gpt-4"].requests, 2);
        assert_eq!(bucket.by_task_type[&TaskType::Content].tokens, 1500);

        let sums = bucket.model_totals();
        assert!((sums.cost - bucket.total_cost).abs() < 1e-9);
        assert_eq!(sums.tokens, bucket.total_tokens);
        assert_eq!(sums.requests, bucket.request_count);
    }

    #[test]
    fn first_request_is_sticky() {
        let mut bucket = UsageBucket::new("acme", day());
        let first = Utc::now();
        let later = first + chrono::Duration::minutes(5);
        bucket.record("gpt-4", TaskType::Content, 0.1, 10, first);
        bucket.record("gpt-4", TaskType::Content, 0.1, 10, later);
        assert_eq!(bucket.first_request_at, Some(first));
        assert_eq!(bucket.last_activity_at, Some(later));
    }

    #[test]
    fn usage_percent_takes_tightest_limit() {
        let mut bucket = UsageBucket::new("acme", day());
        // Free: $10 / 100k tokens / 100 requests
        bucket.record("gpt-4", TaskType::Content, 1.0, 50_000, Utc::now());
        let pct = bucket.usage_percent(Tier::Free.definition());
        assert!((pct.cost - 10.0).abs() < 1e-9);
        assert!((pct.tokens - 50.0).abs() < 1e-9);
        assert!((pct.requests - 1.0).abs() < 1e-9);
        assert!((pct.max() - 50.0).abs() < 1e-9);
    }
}
