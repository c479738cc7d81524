//! Field helpers for structured logging

use crate::provider::ProviderResponse;
use crate::task::PromptConfig;

/// Maximum characters kept in a prompt preview
pub const PREVIEW_CHARS: usize = 100;

/// Extract token counts from a provider response
///
/// Returns a tuple of (prompt_tokens, completion_tokens, total_tokens).
pub fn extract_tokens(response: &ProviderResponse) -> (u32, u32, u64) {
    (
        response.usage.prompt_tokens,
        response.usage.completion_tokens,
        response.tokens_used(),
    )
}

/// Truncated user prompt for logging (privacy-safe)
///
/// Returns None if content logging is disabled or the prompt is empty.
///
/// # Examples
///
/// ```
/// use tollgate::logging::truncate_prompt;
/// use tollgate::task::PromptConfig;
///
/// let prompt = PromptConfig {
///     system_prompt: "You write ads.".to_string(),
///     user_prompt: "Hello, world!".to_string(),
///     schema_type: "content".to_string(),
///     temperature: 0.7,
///     max_tokens: 100,
///     stop_sequences: vec![],
/// };
///
/// assert_eq!(truncate_prompt(&prompt, true).as_deref(), Some("Hello, world!"));
/// assert!(truncate_prompt(&prompt, false).is_none());
/// ```
pub fn truncate_prompt(prompt: &PromptConfig, enable_content_logging: bool) -> Option<String> {
    if !enable_content_logging || prompt.user_prompt.is_empty() {
        return None;
    }
    Some(truncate_string(&prompt.user_prompt, PREVIEW_CHARS))
}

/// Truncate to `max_chars` characters, never splitting a UTF-8 sequence
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TokenUsage;

    #[test]
    fn test_extract_tokens() {
        let response = ProviderResponse {
            content: String::new(),
            model: "gpt-4".to_string(),
            usage: TokenUsage::new(100, 50),
        };

        let (prompt, completion, total) = extract_tokens(&response);
        assert_eq!(prompt, 100);
        assert_eq!(completion, 50);
        assert_eq!(total, 150);
    }

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate_string("short", 100), "short");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "é".repeat(150);
        let preview = truncate_string(&text, 100);
        assert_eq!(preview.chars().count(), 103);
        assert!(preview.ends_with("..."));
    }
}
