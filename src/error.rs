//! Error types for the orchestration engine
//!
//! Callers of a task handler only ever see the pre-dispatch variants
//! (`Validation`, `QuotaExceeded`, `SafetyBlocked`, `NotFound`). Everything
//! raised after a provider call has been attempted is folded into a
//! `TaskResult { success: false, .. }` by the handler.

use crate::provider::ProviderError;
use std::fmt;
use thiserror::Error;

/// A quota dimension that can reject a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaLimit {
    DailyCost,
    DailyTokens,
    DailyRequests,
    RequestsPerMinute,
    ConcurrentRequests,
}

impl QuotaLimit {
    /// Label used in metrics and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaLimit::DailyCost => "daily_cost",
            QuotaLimit::DailyTokens => "daily_tokens",
            QuotaLimit::DailyRequests => "daily_requests",
            QuotaLimit::RequestsPerMinute => "requests_per_minute",
            QuotaLimit::ConcurrentRequests => "concurrent_requests",
        }
    }
}

impl fmt::Display for QuotaLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn join_limits(limits: &[QuotaLimit]) -> String {
    limits
        .iter()
        .map(QuotaLimit::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors produced by the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed input or parameters. Never retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A budget or pacing limit was hit. Never retried.
    #[error("Quota exceeded for tenant '{tenant_id}': {}", join_limits(.limits))]
    QuotaExceeded {
        tenant_id: String,
        limits: Vec<QuotaLimit>,
    },

    /// The safety validator refused the prompt.
    #[error("Request blocked by safety check: {0}")]
    SafetyBlocked(String),

    /// Tenant or campaign could not be resolved.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// Rate-limited or timed-out upstream after retries ran out.
    #[error("Provider transient failure: {0}")]
    ProviderTransient(String),

    /// Any other provider failure after retries ran out.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Loop finished without a response.
    #[error("Request failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// The request deadline passed before a response arrived.
    #[error("Deadline exceeded after {attempts} attempts")]
    DeadlineExceeded { attempts: u32 },

    /// Catch-all for unexpected conditions.
    #[error("Service error: {0}")]
    Service(String),
}

impl EngineError {
    pub fn quota(tenant_id: impl Into<String>, limits: Vec<QuotaLimit>) -> Self {
        EngineError::QuotaExceeded {
            tenant_id: tenant_id.into(),
            limits,
        }
    }

    pub fn tenant_not_found(id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind: "Tenant",
            id: id.into(),
        }
    }

    /// Whether this error may be raised to a task handler's caller.
    pub fn is_pre_dispatch(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_)
                | EngineError::QuotaExceeded { .. }
                | EngineError::SafetyBlocked(_)
                | EngineError::NotFound { .. }
        )
    }

    /// Whether the dispatcher may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::ProviderTransient(_) | EngineError::Provider(_)
        )
    }

    /// Short machine-friendly label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::QuotaExceeded { .. } => "quota_exceeded",
            EngineError::SafetyBlocked(_) => "safety_blocked",
            EngineError::NotFound { .. } => "not_found",
            EngineError::ProviderTransient(_) => "provider_transient",
            EngineError::Provider(_) => "provider",
            EngineError::RetriesExhausted { .. } => "retries_exhausted",
            EngineError::DeadlineExceeded { .. } => "deadline_exceeded",
            EngineError::Service(_) => "service",
        }
    }
}

impl From<ProviderError> for EngineError {
    fn from(err: ProviderError) -> Self {
        if err.is_transient() {
            EngineError::ProviderTransient(err.to_string())
        } else {
            EngineError::Provider(err.to_string())
        }
    }
}
