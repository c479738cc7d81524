//! # Metrics
//!
//! Thin wrappers over the `metrics` facade. Nothing is exported unless the
//! host process installs a recorder; without one every call is a no-op.
//!
//! **Counters:**
//! - `tollgate_requests_total{task_type, status}` - Task handler outcomes
//! - `tollgate_provider_attempts_total{model, outcome}` - Provider calls
//! - `tollgate_cost_microusd_total{model}` - Recorded spend in micro-dollars
//! - `tollgate_tokens_total{model}` - Recorded tokens
//! - `tollgate_quota_rejections_total{limit}` - Budget and pacing rejections
//! - `tollgate_alerts_total{alert_type}` - Fired budget alerts
//!
//! **Histograms:**
//! - `tollgate_budget_utilization_percent{tier}` - Tightest daily limit usage
//!   after each recorded request. Labelled by tier, not tenant, to keep
//!   cardinality fixed.

use crate::alerting::AlertType;
use crate::catalog::Tier;
use crate::error::QuotaLimit;
use crate::task::TaskType;

pub fn record_task(task_type: TaskType, success: bool) {
    let status = if success { "success" } else { "failure" };
    metrics::counter!(
        "tollgate_requests_total",
        "task_type" => task_type.as_str(),
        "status" => status
    )
    .increment(1);
}

pub fn record_provider_attempt(model: &str, outcome: &'static str) {
    metrics::counter!(
        "tollgate_provider_attempts_total",
        "model" => model.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_usage(model: &str, cost_usd: f64, tokens: u64) {
    metrics::counter!("tollgate_tokens_total", "model" => model.to_string()).increment(tokens);
    // Counters are integral; track spend in micro-dollars
    metrics::counter!("tollgate_cost_microusd_total", "model" => model.to_string())
        .increment((cost_usd * 1_000_000.0).round() as u64);
}

pub fn record_quota_rejection(limits: &[QuotaLimit]) {
    for limit in limits {
        metrics::counter!("tollgate_quota_rejections_total", "limit" => limit.as_str())
            .increment(1);
    }
}

pub fn record_alert(alert_type: AlertType) {
    metrics::counter!("tollgate_alerts_total", "alert_type" => alert_type.as_str()).increment(1);
}

pub fn record_budget_utilization(tier: Tier, percent: f64) {
    metrics::histogram!("tollgate_budget_utilization_percent", "tier" => tier.as_str())
        .record(percent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::{
        Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use parking_lot::Mutex;

    /// Keeps the name and labels of every registered histogram
    #[derive(Default)]
    struct KeyRecorder {
        histograms: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl Recorder for KeyRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
            let labels = key
                .labels()
                .map(|l| (l.key().to_string(), l.value().to_string()))
                .collect();
            self.histograms.lock().push((key.name().to_string(), labels));
            Histogram::noop()
        }
    }

    #[test]
    fn utilization_is_labelled_by_tier_only() {
        let recorder = KeyRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            record_budget_utilization(Tier::Pro, 42.0);
        });

        let histograms = recorder.histograms.lock();
        assert_eq!(
            *histograms,
            vec![(
                "tollgate_budget_utilization_percent".to_string(),
                vec![("tier".to_string(), "pro".to_string())]
            )]
        );
    }
}
