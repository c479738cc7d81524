//! Error types for provider calls.

use thiserror::Error;

/// Why a transient failure is expected to clear on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// Upstream throttled the request (HTTP 429 or equivalent).
    RateLimited,
    /// Upstream did not answer in time.
    Timeout,
    /// Upstream is temporarily overloaded or unavailable.
    Unavailable,
}

impl TransientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransientKind::RateLimited => "rate_limited",
            TransientKind::Timeout => "timeout",
            TransientKind::Unavailable => "unavailable",
        }
    }
}

/// Errors surfaced by an [`AiProvider`](super::AiProvider) implementation.
///
/// Providers classify failures themselves; the dispatcher never inspects
/// message text to decide whether to retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Failure expected to succeed on retry.
    #[error("{} ({message})", .kind.as_str())]
    Transient { kind: TransientKind, message: String },

    /// Any other failure (bad request, auth, malformed response).
    #[error("{0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn rate_limited(message: impl Into<String>) -> Self {
        ProviderError::Transient {
            kind: TransientKind::RateLimited,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        ProviderError::Transient {
            kind: TransientKind::Timeout,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient { .. })
    }

    /// Label for metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            ProviderError::Transient { kind, .. } => kind.as_str(),
            ProviderError::Permanent(_) => "permanent",
        }
    }
}
