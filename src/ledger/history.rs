//! Bounded usage history.
//!
//! Keeps the last `capacity` usage snapshots across all tenants; the oldest
//! entry is evicted when full.

use super::bucket::UsageBucket;
use crate::task::TaskType;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;

/// Immutable copy of a bucket taken right after a usage was recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub recorded_at: DateTime<Utc>,
    pub model: String,
    pub task_type: TaskType,
    /// Cost of the request that produced this snapshot
    pub cost: f64,
    /// Tokens of the request that produced this snapshot
    pub tokens: u64,
    pub bucket: UsageBucket,
}

/// Ring buffer of usage snapshots
pub struct UsageHistory {
    entries: RwLock<VecDeque<UsageSnapshot>>,
    capacity: usize,
}

impl UsageHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Adds a snapshot, evicting the oldest if at capacity
    pub fn push(&self, snapshot: UsageSnapshot) {
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(snapshot);
    }

    /// All snapshots in chronological order (oldest first)
    pub fn get_all(&self) -> Vec<UsageSnapshot> {
        self.entries.read().iter().cloned().collect()
    }

    /// Snapshots for one tenant, oldest first
    pub fn for_tenant(&self, tenant_id: &str) -> Vec<UsageSnapshot> {
        self.entries
            .read()
            .iter()
            .filter(|s| s.bucket.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn snapshot(tenant: &str, cost: f64) -> UsageSnapshot {
        UsageSnapshot {
            recorded_at: Utc::now(),
            model: "gpt-4".to_string(),
            task_type: TaskType::Content,
            cost,
            tokens: 10,
            bucket: UsageBucket::new(tenant, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
        }
    }

    #[test]
    fn evicts_oldest_when_full() {
        let history = UsageHistory::new(3);
        for i in 0..5 {
            history.push(snapshot("acme", i as f64));
        }
        let all = history.get_all();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].cost, 2.0);
        assert_eq!(all[2].cost, 4.0);
    }

    #[test]
    fn filters_by_tenant() {
        let history = UsageHistory::new(10);
        history.push(snapshot("acme", 1.0));
        history.push(snapshot("globex", 2.0));
        history.push(snapshot("acme", 3.0));
        let acme = history.for_tenant("acme");
        assert_eq!(acme.len(), 2);
        assert_eq!(acme[1].cost, 3.0);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let history = UsageHistory::new(0);
        assert_eq!(history.capacity(), 1);
        history.push(snapshot("acme", 1.0));
        history.push(snapshot("acme", 2.0));
        assert_eq!(history.len(), 1);
    }
}
