//! Per-tenant pacing for provider calls.
//!
//! Two limits apply to every attempt:
//!
//! - a sliding-window log per `(tenant, priority)` lane: at most
//!   `requests_per_minute` attempts started within the last `window_seconds`,
//!   and at most `max_concurrent` attempts in flight on the lane;
//! - a tenant-wide in-flight cap equal to the tier's `max_concurrent_requests`.
//!
//! A granted attempt holds a [`RatePermit`]; dropping it frees the in-flight
//! slots. Window entries expire on their own.

use crate::catalog::Tier;
use crate::config::RateLimitConfig;
use crate::error::{EngineError, QuotaLimit};
use crate::task::Priority;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct Lane {
    started: VecDeque<Instant>,
    in_flight: u32,
}

impl Lane {
    fn prune(&mut self, now: Instant, window: std::time::Duration) {
        while let Some(&oldest) = self.started.front() {
            if now.duration_since(oldest) >= window {
                self.started.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Sliding-window rate limiter keyed by `(tenant, priority)`.
pub struct RateLimiter {
    config: RateLimitConfig,
    lanes: DashMap<(String, Priority), Arc<Mutex<Lane>>>,
    tenants: DashMap<String, Arc<AtomicU32>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            lanes: DashMap::new(),
            tenants: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn lane(&self, tenant_id: &str, priority: Priority) -> Arc<Mutex<Lane>> {
        let entry = self
            .lanes
            .entry((tenant_id.to_string(), priority))
            .or_default();
        Arc::clone(entry.value())
    }

    fn tenant_counter(&self, tenant_id: &str) -> Arc<AtomicU32> {
        let entry = self.tenants.entry(tenant_id.to_string()).or_default();
        Arc::clone(entry.value())
    }

    /// Claim a slot for one provider attempt.
    ///
    /// Fails with `QuotaExceeded` naming `ConcurrentRequests` or
    /// `RequestsPerMinute`. Rejections are never queued.
    pub fn acquire(
        &self,
        tenant_id: &str,
        priority: Priority,
        tier: Tier,
    ) -> Result<RatePermit, EngineError> {
        let tenant_cap = tier.definition().max_concurrent_requests;
        let tenant_in_flight = self.tenant_counter(tenant_id);

        // CAS loop so two attempts can't both take the last tenant slot
        loop {
            let current = tenant_in_flight.load(Ordering::SeqCst);
            if current >= tenant_cap {
                return Err(self.reject(tenant_id, priority, QuotaLimit::ConcurrentRequests));
            }
            if tenant_in_flight
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                break;
            }
        }

        let limit = self.config.limit_for(priority);
        let lane = self.lane(tenant_id, priority);
        let refused = {
            let mut state = lane.lock();
            let now = Instant::now();
            state.prune(now, self.config.window());

            if state.in_flight >= limit.max_concurrent {
                Some(QuotaLimit::ConcurrentRequests)
            } else if state.started.len() >= limit.requests_per_minute as usize {
                Some(QuotaLimit::RequestsPerMinute)
            } else {
                state.started.push_back(now);
                state.in_flight += 1;
                None
            }
        };

        if let Some(limit) = refused {
            tenant_in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(self.reject(tenant_id, priority, limit));
        }

        Ok(RatePermit {
            lane,
            tenant_in_flight,
        })
    }

    fn reject(&self, tenant_id: &str, priority: Priority, limit: QuotaLimit) -> EngineError {
        tracing::warn!(
            tenant_id,
            priority = %priority,
            limit = %limit,
            "Rate limit reached"
        );
        crate::metrics::record_quota_rejection(&[limit]);
        EngineError::quota(tenant_id, vec![limit])
    }

    /// Attempts currently in flight for a tenant across all priorities
    pub fn in_flight(&self, tenant_id: &str) -> u32 {
        self.tenants
            .get(tenant_id)
            .map(|counter| counter.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

/// Slot held by one in-flight provider attempt.
#[derive(Debug)]
pub struct RatePermit {
    lane: Arc<Mutex<Lane>>,
    tenant_in_flight: Arc<AtomicU32>,
}

impl Drop for RatePermit {
    fn drop(&mut self) {
        {
            let mut lane = self.lane.lock();
            lane.in_flight = lane.in_flight.saturating_sub(1);
        }
        self.tenant_in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
