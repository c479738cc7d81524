//! Edge-triggered budget alerts.
//!
//! Each tenant carries one [`BudgetAlert`] per configured threshold. An alert
//! fires on the first evaluation of a day at or above its threshold, then
//! stays disarmed until the tenant's usage rolls into a new calendar day.
//! Daily usage never decreases, so day rollover is the only re-arm point.

use crate::config::AlertRule;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Severity of a budget alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Usage is approaching the daily limit
    Warning,
    /// Usage is close enough that requests will start failing soon
    Critical,
    /// A daily limit has been reached
    LimitReached,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Warning => "warning",
            AlertType::Critical => "critical",
            AlertType::LimitReached => "limit_reached",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one alert threshold for one tenant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetAlert {
    pub tenant_id: String,
    pub alert_type: AlertType,
    pub threshold_percent: f64,
    /// Usage percentage observed when the alert last fired
    pub current_usage_percent: Option<f64>,
    pub triggered_at: Option<DateTime<Utc>>,
    pub message: String,
    /// True while the alert may still fire for the current day
    pub armed: bool,
    /// Day the alert last fired
    pub fired_on: Option<NaiveDate>,
}

impl BudgetAlert {
    fn from_rule(tenant_id: &str, rule: &AlertRule) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            alert_type: rule.alert_type,
            threshold_percent: rule.threshold_percent,
            current_usage_percent: None,
            triggered_at: None,
            message: String::new(),
            armed: true,
            fired_on: None,
        }
    }
}

/// Delivers fired alerts (email, webhook, chat, ...).
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, alert: &BudgetAlert);
}

/// Default notifier: emits a `warn` event per alert.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, alert: &BudgetAlert) {
        tracing::warn!(
            tenant_id = %alert.tenant_id,
            alert_type = %alert.alert_type,
            threshold_percent = alert.threshold_percent,
            usage_percent = alert.current_usage_percent.unwrap_or_default(),
            "{}",
            alert.message
        );
    }
}

/// Evaluates alert thresholds against ledger usage.
///
/// Reads usage percentages handed in by the ledger; never touches buckets.
pub struct AlertEngine {
    default_rules: Vec<AlertRule>,
    tenants: DashMap<String, Vec<BudgetAlert>>,
    notifier: Arc<dyn Notifier>,
}

impl AlertEngine {
    pub fn new(default_rules: Vec<AlertRule>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            default_rules,
            tenants: DashMap::new(),
            notifier,
        }
    }

    /// Replace the thresholds for one tenant. Existing alert state is reset.
    pub fn configure(&self, tenant_id: &str, rules: &[AlertRule]) {
        let alerts = rules
            .iter()
            .map(|rule| BudgetAlert::from_rule(tenant_id, rule))
            .collect();
        self.tenants.insert(tenant_id.to_string(), alerts);
    }

    /// Current alert states for a tenant (defaults if never evaluated)
    pub fn alerts_for(&self, tenant_id: &str) -> Vec<BudgetAlert> {
        match self.tenants.get(tenant_id) {
            Some(alerts) => alerts.clone(),
            None => self
                .default_rules
                .iter()
                .map(|rule| BudgetAlert::from_rule(tenant_id, rule))
                .collect(),
        }
    }

    /// Evaluate `usage_percent` as of `now`, firing every armed alert whose
    /// threshold has been reached. Returns the alerts fired by this call.
    pub fn evaluate(&self, tenant_id: &str, usage_percent: f64, now: DateTime<Utc>) -> Vec<BudgetAlert> {
        let day = now.date_naive();
        let mut fired = Vec::new();

        {
            let mut entry = self.tenants.entry(tenant_id.to_string()).or_insert_with(|| {
                self.default_rules
                    .iter()
                    .map(|rule| BudgetAlert::from_rule(tenant_id, rule))
                    .collect()
            });

            for alert in entry.iter_mut() {
                // Re-arm on day rollover
                if alert.fired_on.is_some_and(|d| d < day) {
                    alert.armed = true;
                }

                if alert.armed && usage_percent >= alert.threshold_percent {
                    alert.armed = false;
                    alert.fired_on = Some(day);
                    alert.triggered_at = Some(now);
                    alert.current_usage_percent = Some(usage_percent);
                    alert.message = format!(
                        "Tenant '{}' has used {:.1}% of its daily AI budget ({} threshold: {:.0}%)",
                        tenant_id, usage_percent, alert.alert_type, alert.threshold_percent
                    );
                    fired.push(alert.clone());
                }
            }
        }

        // Notify outside the map guard
        for alert in &fired {
            crate::metrics::record_alert(alert.alert_type);
            self.notifier.notify(alert);
        }

        fired
    }
}
