//! In-process collaborator adapters.
//!
//! These back the `simulate` command and the test suite. A real deployment
//! supplies its own tenant store, prompt templates and provider client.

use crate::catalog::Tier;
use crate::error::EngineError;
use crate::provider::{AiProvider, GenerationConfig, ProviderError, ProviderResponse, TokenUsage};
use crate::task::{
    estimate_prompt_tokens, CampaignContext, InteractionLog, InteractionRecord, PromptBuilder,
    PromptConfig, SafetyValidator, SafetyVerdict, SchemaValidator, TaskRequest, TaskType,
    TenantContext, TenantDirectory,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Keys each task's response object must carry
pub fn required_keys(schema_type: &str) -> &'static [&'static str] {
    match schema_type {
        "strategy" => &["objectives", "channels", "timeline"],
        "content" => &["headline", "body", "call_to_action"],
        "video_script" => &["hook", "scenes", "call_to_action"],
        "analytics_insight" => &["insights", "recommendations"],
        "customer_reply" => &["reply", "tone"],
        _ => &[],
    }
}

/// Fixed set of tenants and campaigns.
#[derive(Debug, Default)]
pub struct StaticTenantDirectory {
    tenants: HashMap<String, TenantContext>,
    campaigns: HashMap<(String, String), CampaignContext>,
}

impl StaticTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant_id: &str, name: &str, tier: Tier) -> Self {
        self.tenants.insert(
            tenant_id.to_string(),
            TenantContext {
                tenant_id: tenant_id.to_string(),
                name: name.to_string(),
                tier,
                industry: None,
                brand_voice: None,
            },
        );
        self
    }

    pub fn with_campaign(mut self, tenant_id: &str, campaign: CampaignContext) -> Self {
        self.campaigns
            .insert((tenant_id.to_string(), campaign.campaign_id.clone()), campaign);
        self
    }
}

#[async_trait]
impl TenantDirectory for StaticTenantDirectory {
    async fn tenant(&self, tenant_id: &str) -> Option<TenantContext> {
        self.tenants.get(tenant_id).cloned()
    }

    async fn campaign(&self, tenant_id: &str, campaign_id: &str) -> Option<CampaignContext> {
        self.campaigns
            .get(&(tenant_id.to_string(), campaign_id.to_string()))
            .cloned()
    }
}

/// Plain-text prompt templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplatePromptBuilder;

impl TemplatePromptBuilder {
    fn build(
        task_type: TaskType,
        tenant: &TenantContext,
        campaign: Option<&CampaignContext>,
        parameters: &Map<String, Value>,
        instruction: &str,
    ) -> PromptConfig {
        let (temperature, max_tokens) = match task_type {
            TaskType::Strategy => (0.7, 2000),
            TaskType::Content => (0.8, 1500),
            TaskType::VideoScript => (0.8, 2500),
            TaskType::AnalyticsInsight => (0.3, 1000),
            TaskType::CustomerReply => (0.5, 500),
        };
        let schema_type = task_type.as_str().to_string();
        let keys = required_keys(&schema_type).join(", ");

        let mut system_prompt = format!(
            "You are an AI marketing assistant for {}. Respond with a JSON object with keys: {}.",
            tenant.name, keys
        );
        if let Some(voice) = &tenant.brand_voice {
            system_prompt.push_str(&format!(" Write in this brand voice: {voice}."));
        }

        let mut user_prompt = instruction.to_string();
        if let Some(campaign) = campaign {
            user_prompt.push_str(&format!("\nCampaign: {}", campaign.name));
            if let Some(objective) = &campaign.objective {
                user_prompt.push_str(&format!(" (objective: {objective})"));
            }
        }
        if !parameters.is_empty() {
            user_prompt.push_str(&format!("\nInputs: {}", Value::Object(parameters.clone())));
        }

        PromptConfig {
            system_prompt,
            user_prompt,
            schema_type,
            temperature,
            max_tokens,
            stop_sequences: Vec::new(),
        }
    }
}

impl PromptBuilder for TemplatePromptBuilder {
    fn build_strategy_prompt(
        &self,
        tenant: &TenantContext,
        campaign: Option<&CampaignContext>,
        parameters: &Map<String, Value>,
    ) -> Result<PromptConfig, EngineError> {
        Ok(Self::build(
            TaskType::Strategy,
            tenant,
            campaign,
            parameters,
            "Draft a marketing strategy for the coming quarter.",
        ))
    }

    fn build_content_prompt(
        &self,
        tenant: &TenantContext,
        campaign: Option<&CampaignContext>,
        parameters: &Map<String, Value>,
    ) -> Result<PromptConfig, EngineError> {
        Ok(Self::build(
            TaskType::Content,
            tenant,
            campaign,
            parameters,
            "Write a social media post.",
        ))
    }

    fn build_video_script_prompt(
        &self,
        tenant: &TenantContext,
        campaign: Option<&CampaignContext>,
        parameters: &Map<String, Value>,
    ) -> Result<PromptConfig, EngineError> {
        Ok(Self::build(
            TaskType::VideoScript,
            tenant,
            campaign,
            parameters,
            "Write a 30-second video script.",
        ))
    }

    fn build_analytics_insight_prompt(
        &self,
        tenant: &TenantContext,
        campaign: Option<&CampaignContext>,
        parameters: &Map<String, Value>,
    ) -> Result<PromptConfig, EngineError> {
        Ok(Self::build(
            TaskType::AnalyticsInsight,
            tenant,
            campaign,
            parameters,
            "Explain what these campaign metrics show.",
        ))
    }

    fn build_customer_reply_prompt(
        &self,
        tenant: &TenantContext,
        campaign: Option<&CampaignContext>,
        parameters: &Map<String, Value>,
    ) -> Result<PromptConfig, EngineError> {
        let message = parameters
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| {
                EngineError::Validation("customer reply requires a non-empty 'message'".into())
            })?;
        Ok(Self::build(
            TaskType::CustomerReply,
            tenant,
            campaign,
            &Map::new(),
            &format!("Reply to this customer message: {message}"),
        ))
    }
}

/// Blocks prompts containing any of a list of terms (case-insensitive).
#[derive(Debug, Default, Clone)]
pub struct KeywordSafetyValidator {
    blocked_terms: Vec<String>,
}

impl KeywordSafetyValidator {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocked_terms: terms.into_iter().map(|t| t.into().to_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl SafetyValidator for KeywordSafetyValidator {
    async fn validate(&self, _request: &TaskRequest, prompt: &PromptConfig) -> SafetyVerdict {
        let text = prompt.user_prompt.to_lowercase();
        match self.blocked_terms.iter().find(|term| text.contains(term.as_str())) {
            Some(term) => SafetyVerdict::Blocked(format!("prompt mentions blocked term '{term}'")),
            None => SafetyVerdict::Allowed,
        }
    }
}

/// Requires a JSON object carrying the schema's keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSchemaValidator;

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, raw_content: &str, schema_type: &str) -> Result<Value, EngineError> {
        let value: Value = serde_json::from_str(raw_content.trim())
            .map_err(|e| EngineError::Validation(format!("response is not valid JSON: {e}")))?;
        let object = value.as_object().ok_or_else(|| {
            EngineError::Validation("response must be a JSON object".to_string())
        })?;

        let missing: Vec<&str> = required_keys(schema_type)
            .iter()
            .copied()
            .filter(|key| !object.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::Validation(format!(
                "{} response is missing: {}",
                schema_type,
                missing.join(", ")
            )));
        }
        Ok(value)
    }
}

/// Keeps every interaction in memory.
#[derive(Debug, Default)]
pub struct MemoryInteractionLog {
    records: Mutex<Vec<InteractionRecord>>,
}

impl MemoryInteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<InteractionRecord> {
        self.records.lock().clone()
    }
}

impl InteractionLog for MemoryInteractionLog {
    fn log_interaction(&self, record: InteractionRecord) {
        tracing::trace!(
            task_id = %record.task_id,
            tenant_id = %record.tenant_id,
            success = record.success,
            "Interaction logged"
        );
        self.records.lock().push(record);
    }
}

/// Provider that answers with JSON carrying the keys the system prompt asks for.
///
/// Every `throttle_every`-th call fails with a rate-limit error.
#[derive(Debug)]
pub struct SimulatedProvider {
    latency: Duration,
    throttle_every: Option<u64>,
    calls: AtomicU64,
}

impl SimulatedProvider {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            throttle_every: None,
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_throttling(mut self, every: u64) -> Self {
        self.throttle_every = (every > 0).then_some(every);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn requested_keys(system_prompt: &str) -> Vec<&str> {
        system_prompt
            .split_once("keys: ")
            .and_then(|(_, rest)| rest.split_once('.'))
            .map(|(keys, _)| keys.split(", ").filter(|k| !k.is_empty()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AiProvider for SimulatedProvider {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        config: &GenerationConfig,
    ) -> Result<ProviderResponse, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.throttle_every.is_some_and(|every| call % every == 0) {
            return Err(ProviderError::rate_limited("simulated throttling"));
        }

        let mut body = Map::new();
        for key in Self::requested_keys(system_prompt) {
            body.insert(key.to_string(), Value::String(format!("generated {key}")));
        }
        let content = Value::Object(body).to_string();

        let prompt_tokens = estimate_prompt_tokens(prompt) + estimate_prompt_tokens(system_prompt);
        let completion_tokens = estimate_prompt_tokens(&content).min(config.max_tokens as u64);

        Ok(ProviderResponse {
            content,
            model: config.model.clone(),
            usage: TokenUsage::new(
                u32::try_from(prompt_tokens).unwrap_or(u32::MAX),
                u32::try_from(completion_tokens).unwrap_or(u32::MAX),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantContext {
        TenantContext {
            tenant_id: "acme".to_string(),
            name: "Acme Coffee".to_string(),
            tier: Tier::Pro,
            industry: None,
            brand_voice: Some("warm".to_string()),
        }
    }

    #[tokio::test]
    async fn simulated_output_passes_schema() {
        let prompt = TemplatePromptBuilder
            .build_video_script_prompt(&tenant(), None, &Map::new())
            .unwrap();
        let provider = SimulatedProvider::new(Duration::ZERO);
        let config = GenerationConfig {
            model: "gpt-4o".to_string(),
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
            stop_sequences: vec![],
        };
        let response = provider
            .generate(&prompt.user_prompt, &prompt.system_prompt, &config)
            .await
            .unwrap();

        let value = JsonSchemaValidator
            .validate(&response.content, &prompt.schema_type)
            .unwrap();
        assert!(value.get("scenes").is_some());
        assert!(response.usage.prompt_tokens > 0);
    }

    #[tokio::test]
    async fn throttles_on_schedule() {
        let provider = SimulatedProvider::new(Duration::ZERO).with_throttling(2);
        let config = GenerationConfig {
            model: "gpt-4o".to_string(),
            temperature: 0.5,
            max_tokens: 100,
            stop_sequences: vec![],
        };
        assert!(provider.generate("a", "b", &config).await.is_ok());
        let err = provider.generate("a", "b", &config).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(provider.calls(), 2);
    }

    #[test]
    fn schema_validator_reports_missing_keys() {
        let err = JsonSchemaValidator
            .validate(r#"{"reply": "thanks"}"#, "customer_reply")
            .unwrap_err();
        assert!(err.to_string().contains("tone"));

        assert!(JsonSchemaValidator.validate("not json", "content").is_err());
        assert!(JsonSchemaValidator.validate("[1, 2]", "content").is_err());
    }

    #[tokio::test]
    async fn keyword_validator_is_case_insensitive() {
        let validator = KeywordSafetyValidator::new(["Miracle Cure"]);
        let request = TaskRequest::new(TaskType::Content, "acme", "u1");
        let mut prompt = TemplatePromptBuilder
            .build_content_prompt(&tenant(), None, &Map::new())
            .unwrap();
        assert_eq!(validator.validate(&request, &prompt).await, SafetyVerdict::Allowed);

        prompt.user_prompt.push_str(" Advertise our MIRACLE cure tea.");
        assert!(matches!(
            validator.validate(&request, &prompt).await,
            SafetyVerdict::Blocked(_)
        ));
    }

    #[test]
    fn customer_reply_prompt_requires_message() {
        let err = TemplatePromptBuilder
            .build_customer_reply_prompt(&tenant(), None, &Map::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
