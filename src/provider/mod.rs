//! Generative-AI provider abstraction.
//!
//! The engine never talks to a vendor directly. Everything goes through
//! [`AiProvider`], which a deployment implements on top of its HTTP client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod error;

pub use error::{ProviderError, TransientKind};

/// Sampling parameters for one provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens as u64 + self.completion_tokens as u64
    }
}

/// A completed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Raw text returned by the model
    pub content: String,
    /// Model that actually served the request
    pub model: String,
    pub usage: TokenUsage,
}

impl ProviderResponse {
    /// Total tokens billed for this response
    pub fn tokens_used(&self) -> u64 {
        self.usage.total()
    }
}

/// Unified interface to the generative-AI backend.
///
/// Object-safe; used as `Arc<dyn AiProvider>`. Implementations must map
/// throttling and timeouts to [`ProviderError::Transient`] so the dispatcher
/// can retry them.
#[async_trait]
pub trait AiProvider: Send + Sync + 'static {
    /// Human-readable name for logs (e.g. "openai").
    fn name(&self) -> &str;

    /// Run one generation.
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        config: &GenerationConfig,
    ) -> Result<ProviderResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_used_sums_prompt_and_completion() {
        let response = ProviderResponse {
            content: "{}".to_string(),
            model: "gpt-4".to_string(),
            usage: TokenUsage::new(1200, 300),
        };
        assert_eq!(response.tokens_used(), 1500);
    }

    #[test]
    fn transient_constructors() {
        assert!(ProviderError::rate_limited("429").is_transient());
        assert!(ProviderError::timeout("30s").is_transient());
        assert!(!ProviderError::Permanent("401".into()).is_transient());
        assert_eq!(ProviderError::timeout("x").outcome(), "timeout");
    }

    #[test]
    fn transient_display_includes_kind() {
        let err = ProviderError::rate_limited("too many requests");
        assert_eq!(err.to_string(), "rate_limited (too many requests)");
    }

    #[test]
    fn generation_config_omits_empty_stop_sequences() {
        let config = GenerationConfig {
            model: "gpt-4".to_string(),
            temperature: 0.7,
            max_tokens: 512,
            stop_sequences: vec![],
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("stop_sequences"));
    }
}
