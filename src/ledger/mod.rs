//! Budget ledger - per-tenant daily usage, cost accounting and quota enforcement
//!
//! Every tenant owns one [`TenantAccount`] behind its own mutex. All reads and
//! writes of a tenant's buckets go through that lock, so the pre-flight check
//! and the post-call recording behave as one tenant-scoped transaction:
//!
//! 1. [`BudgetLedger::reserve`] checks the projected totals (recorded usage
//!    plus every outstanding reservation) and holds the estimate.
//! 2. The request runs.
//! 3. [`BudgetLedger::commit`] swaps the held estimate for the actual usage.
//!
//! Buckets are keyed by UTC calendar day and created lazily.

pub mod bucket;
pub mod history;
pub mod reservation;

pub use bucket::{UsageAggregate, UsageBucket, UsagePercent};
pub use history::{UsageHistory, UsageSnapshot};
pub use reservation::BudgetReservation;

use crate::alerting::AlertEngine;
use crate::catalog::{round_usd, PricingTable, Tier};
use crate::clock::Clock;
use crate::config::LedgerConfig;
use crate::error::{EngineError, QuotaLimit};
use crate::provider::ProviderResponse;
use crate::task::TaskType;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Estimates held by in-flight requests.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Pending {
    cost: f64,
    tokens: u64,
    requests: u64,
}

impl Pending {
    fn hold(&mut self, cost: f64, tokens: u64) {
        self.cost += cost;
        self.tokens += tokens;
        self.requests += 1;
    }

    pub(crate) fn release(&mut self, cost: f64, tokens: u64) {
        self.cost = (self.cost - cost).max(0.0);
        self.tokens = self.tokens.saturating_sub(tokens);
        self.requests = self.requests.saturating_sub(1);
    }
}

/// Everything the ledger knows about one tenant.
#[derive(Debug)]
pub(crate) struct TenantAccount {
    tier: Tier,
    days: BTreeMap<NaiveDate, UsageBucket>,
    pub(crate) pending: Pending,
}

impl TenantAccount {
    fn new(tier: Tier) -> Self {
        Self {
            tier,
            days: BTreeMap::new(),
            pending: Pending::default(),
        }
    }

    fn bucket_mut(&mut self, tenant_id: &str, day: NaiveDate) -> &mut UsageBucket {
        self.days
            .entry(day)
            .or_insert_with(|| UsageBucket::new(tenant_id, day))
    }
}

/// Budget left for the current day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RemainingBudget {
    pub cost: f64,
    pub tokens: u64,
    pub requests: u64,
}

/// Result of a pre-flight budget check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetCheck {
    pub within_cost_limit: bool,
    pub within_token_limit: bool,
    pub within_request_limit: bool,
    pub estimated_cost: f64,
    pub estimated_tokens: u64,
    /// Remaining before this request is counted
    pub remaining: RemainingBudget,
    /// AND of the three limit checks
    pub can_proceed: bool,
}

impl BudgetCheck {
    /// Limits this request would break
    pub fn failed_limits(&self) -> Vec<QuotaLimit> {
        let mut failed = Vec::new();
        if !self.within_cost_limit {
            failed.push(QuotaLimit::DailyCost);
        }
        if !self.within_token_limit {
            failed.push(QuotaLimit::DailyTokens);
        }
        if !self.within_request_limit {
            failed.push(QuotaLimit::DailyRequests);
        }
        failed
    }
}

/// Owns all tenant usage buckets and the usage history.
pub struct BudgetLedger {
    config: LedgerConfig,
    pricing: PricingTable,
    accounts: DashMap<String, Arc<Mutex<TenantAccount>>>,
    history: UsageHistory,
    alerts: Arc<AlertEngine>,
    clock: Arc<dyn Clock>,
}

impl BudgetLedger {
    pub fn new(
        config: LedgerConfig,
        pricing: PricingTable,
        alerts: Arc<AlertEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let history = UsageHistory::new(config.history_capacity);
        Self {
            config,
            pricing,
            accounts: DashMap::new(),
            history,
            alerts,
            clock,
        }
    }

    fn account(&self, tenant_id: &str) -> Arc<Mutex<TenantAccount>> {
        let entry = self
            .accounts
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TenantAccount::new(self.config.default_tier))));
        Arc::clone(entry.value())
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn alerts(&self) -> &Arc<AlertEngine> {
        &self.alerts
    }

    /// Set a tenant's subscription tier. Takes effect on the next check.
    pub fn assign_tier(&self, tenant_id: &str, tier: Tier) {
        self.account(tenant_id).lock().tier = tier;
    }

    pub fn tier_of(&self, tenant_id: &str) -> Tier {
        self.accounts
            .get(tenant_id)
            .map(|account| account.lock().tier)
            .unwrap_or(self.config.default_tier)
    }

    /// Estimate the cost of `tokens` on `model` before the call.
    ///
    /// The input/output split is unknown up front, so tokens are divided by
    /// `estimate_input_share` (70/30 by default).
    pub fn estimate_cost(&self, tokens: u64, model: &str) -> f64 {
        let (input, output) = self.estimate_split(tokens);
        self.pricing.cost(model, input, output)
    }

    /// Assumed `(input, output)` division of an estimated token count
    pub fn estimate_split(&self, tokens: u64) -> (u64, u64) {
        let input = (tokens as f64 * self.config.estimate_input_share).round() as u64;
        (input.min(tokens), tokens.saturating_sub(input))
    }

    /// Exact cost from the provider's reported token counts.
    pub fn calculate_cost(&self, response: &ProviderResponse) -> f64 {
        self.pricing.cost(
            &response.model,
            response.usage.prompt_tokens as u64,
            response.usage.completion_tokens as u64,
        )
    }

    fn evaluate_locked(
        account: &TenantAccount,
        day: NaiveDate,
        estimated_tokens: u64,
        estimated_cost: f64,
    ) -> BudgetCheck {
        let limits = account.tier.definition();
        let pending = account.pending;
        let (spent_cost, spent_tokens, spent_requests) = account
            .days
            .get(&day)
            .map_or((0.0, 0, 0), |b| (b.total_cost, b.total_tokens, b.request_count));

        let committed_cost = spent_cost + pending.cost;
        let committed_tokens = spent_tokens + pending.tokens;
        let committed_requests = spent_requests + pending.requests;

        let within_cost_limit =
            round_usd(committed_cost + estimated_cost) <= limits.daily_cost_limit;
        let within_token_limit = committed_tokens + estimated_tokens <= limits.daily_token_limit;
        let within_request_limit = committed_requests < limits.daily_request_limit;

        BudgetCheck {
            within_cost_limit,
            within_token_limit,
            within_request_limit,
            estimated_cost,
            estimated_tokens,
            remaining: RemainingBudget {
                cost: round_usd((limits.daily_cost_limit - committed_cost).max(0.0)),
                tokens: limits.daily_token_limit.saturating_sub(committed_tokens),
                requests: limits.daily_request_limit.saturating_sub(committed_requests),
            },
            can_proceed: within_cost_limit && within_token_limit && within_request_limit,
        }
    }

    /// Check whether a request of `estimated_tokens` on `model` fits today's limits.
    ///
    /// Outstanding reservations count as spent. Does not hold anything; use
    /// [`reserve`](Self::reserve) to check and hold atomically.
    pub fn check_budget_before_request(
        &self,
        tenant_id: &str,
        estimated_tokens: u64,
        model: &str,
    ) -> BudgetCheck {
        let estimated_cost = self.estimate_cost(estimated_tokens, model);
        let day = self.clock.today();
        let account = self.account(tenant_id);
        let guard = account.lock();
        Self::evaluate_locked(&guard, day, estimated_tokens, estimated_cost)
    }

    /// Check the budget and hold the estimate until commit or drop.
    ///
    /// Returns `QuotaExceeded` naming every failed limit when the request
    /// does not fit.
    pub fn reserve(
        &self,
        tenant_id: &str,
        estimated_tokens: u64,
        model: &str,
    ) -> Result<BudgetReservation, EngineError> {
        let estimated_cost = self.estimate_cost(estimated_tokens, model);
        let day = self.clock.today();
        let account = self.account(tenant_id);

        {
            let mut guard = account.lock();
            let check = Self::evaluate_locked(&guard, day, estimated_tokens, estimated_cost);

            if !check.can_proceed {
                let limits = check.failed_limits();
                tracing::warn!(
                    tenant_id,
                    estimated_cost,
                    estimated_tokens,
                    remaining_cost = check.remaining.cost,
                    remaining_tokens = check.remaining.tokens,
                    remaining_requests = check.remaining.requests,
                    ?limits,
                    "Pre-flight budget check failed"
                );
                crate::metrics::record_quota_rejection(&limits);
                return Err(EngineError::quota(tenant_id, limits));
            }

            guard.pending.hold(estimated_cost, estimated_tokens);
        }

        Ok(BudgetReservation {
            tenant_id: tenant_id.to_string(),
            model: model.to_string(),
            estimated_cost,
            estimated_tokens,
            account,
            released: false,
        })
    }

    /// Record actual usage against a reservation.
    pub fn commit(
        &self,
        mut reservation: BudgetReservation,
        response: &ProviderResponse,
        cost: f64,
        task_type: TaskType,
    ) -> Result<UsageSnapshot, EngineError> {
        let tenant_id = reservation.tenant_id.clone();
        self.record(&tenant_id, response, cost, task_type, Some(&mut reservation))
    }

    /// Record usage that was not reserved up front.
    ///
    /// Fails with `QuotaExceeded` when any daily limit is now at or past 100%.
    /// The usage is recorded either way.
    pub fn track_usage(
        &self,
        tenant_id: &str,
        response: &ProviderResponse,
        cost: f64,
        task_type: TaskType,
    ) -> Result<UsageSnapshot, EngineError> {
        self.record(tenant_id, response, cost, task_type, None)
    }

    fn record(
        &self,
        tenant_id: &str,
        response: &ProviderResponse,
        cost: f64,
        task_type: TaskType,
        reservation: Option<&mut BudgetReservation>,
    ) -> Result<UsageSnapshot, EngineError> {
        let now = self.clock.now();
        let day = now.date_naive();
        let tokens = response.tokens_used();
        let account = self.account(tenant_id);

        let (snapshot, percent, tier) = {
            let mut guard = account.lock();
            if let Some(reservation) = reservation {
                reservation.release_locked(&mut guard);
            }
            let tier = guard.tier;
            let limits = tier.definition();
            let bucket = guard.bucket_mut(tenant_id, day);
            bucket.record(&response.model, task_type, cost, tokens, now);
            let percent = bucket.usage_percent(limits);
            let snapshot = UsageSnapshot {
                recorded_at: now,
                model: response.model.clone(),
                task_type,
                cost,
                tokens,
                bucket: bucket.clone(),
            };
            (snapshot, percent, tier)
        };

        self.history.push(snapshot.clone());
        crate::metrics::record_usage(&response.model, cost, tokens);

        tracing::debug!(
            tenant_id,
            model = %response.model,
            task_type = %task_type,
            cost_usd = cost,
            tokens,
            daily_cost = snapshot.bucket.total_cost,
            daily_requests = snapshot.bucket.request_count,
            "Usage recorded"
        );

        self.check_usage_limits(tenant_id, tier, &percent, now)?;
        Ok(snapshot)
    }

    fn check_usage_limits(
        &self,
        tenant_id: &str,
        tier: Tier,
        percent: &UsagePercent,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let usage_percent = percent.max();
        crate::metrics::record_budget_utilization(tier, usage_percent);
        self.alerts.evaluate(tenant_id, usage_percent, now);

        let mut reached = Vec::new();
        if percent.cost >= 100.0 {
            reached.push(QuotaLimit::DailyCost);
        }
        if percent.tokens >= 100.0 {
            reached.push(QuotaLimit::DailyTokens);
        }
        if percent.requests >= 100.0 {
            reached.push(QuotaLimit::DailyRequests);
        }

        if reached.is_empty() {
            return Ok(());
        }

        tracing::error!(
            tenant_id,
            usage_percent,
            limits = ?reached,
            "Daily quota exhausted"
        );
        crate::metrics::record_quota_rejection(&reached);
        Err(EngineError::quota(tenant_id, reached))
    }

    /// Budget left today, counting outstanding reservations as spent.
    pub fn remaining_budget(&self, tenant_id: &str) -> RemainingBudget {
        let day = self.clock.today();
        let account = self.account(tenant_id);
        let guard = account.lock();
        Self::evaluate_locked(&guard, day, 0, 0.0).remaining
    }

    /// Today's bucket, if the tenant has one
    pub fn usage_today(&self, tenant_id: &str) -> Option<UsageBucket> {
        let day = self.clock.today();
        self.accounts
            .get(tenant_id)
            .and_then(|account| account.lock().days.get(&day).cloned())
    }

    /// Buckets for `from..=to`, oldest first. Days without a bucket are skipped.
    pub fn buckets_between(&self, tenant_id: &str, from: NaiveDate, to: NaiveDate) -> Vec<UsageBucket> {
        if from > to {
            return Vec::new();
        }
        self.accounts
            .get(tenant_id)
            .map(|account| {
                account
                    .lock()
                    .days
                    .range(from..=to)
                    .map(|(_, bucket)| bucket.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Usage snapshots recorded for a tenant, oldest first
    pub fn usage_history(&self, tenant_id: &str) -> Vec<UsageSnapshot> {
        self.history.for_tenant(tenant_id)
    }

    pub fn history(&self) -> &UsageHistory {
        &self.history
    }

    pub fn tenant_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.accounts.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}
