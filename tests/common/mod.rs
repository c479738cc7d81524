//! Shared test utilities for Tollgate integration tests.
//!
//! Provides an engine wired to in-process adapters plus a scripted provider
//! whose responses and failures are fixed up front.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tollgate::alerting::{AlertType, BudgetAlert, Notifier};
use tollgate::catalog::Tier;
use tollgate::clock::ManualClock;
use tollgate::config::TollgateConfig;
use tollgate::provider::{
    AiProvider, GenerationConfig, ProviderError, ProviderResponse, TokenUsage,
};
use tollgate::simulation::{
    JsonSchemaValidator, KeywordSafetyValidator, MemoryInteractionLog, StaticTenantDirectory,
    TemplatePromptBuilder,
};
use tollgate::task::handler::Collaborators;
use tollgate::task::{CampaignContext, EngineContext};

// =============================================================================
// Scripted Provider
// =============================================================================

/// One scripted provider reply.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Return this content with the given token counts
    Content {
        content: String,
        prompt_tokens: u32,
        completion_tokens: u32,
    },
    Fail(ProviderError),
}

impl Reply {
    pub fn json(content: &str, prompt_tokens: u32, completion_tokens: u32) -> Self {
        Reply::Content {
            content: content.to_string(),
            prompt_tokens,
            completion_tokens,
        }
    }
}

/// Provider that plays back a fixed script, then repeats `fallback`.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: Mutex<Vec<GenerationConfig>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Reply>, fallback: Reply) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Always answers with `content`
    pub fn always(content: &str, prompt_tokens: u32, completion_tokens: u32) -> Arc<Self> {
        Self::new(vec![], Reply::json(content, prompt_tokens, completion_tokens))
    }

    pub fn calls(&self) -> Vec<GenerationConfig> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _system_prompt: &str,
        config: &GenerationConfig,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.lock().push(config.clone());
        let reply = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match reply {
            Reply::Content {
                content,
                prompt_tokens,
                completion_tokens,
            } => Ok(ProviderResponse {
                content,
                model: config.model.clone(),
                usage: TokenUsage::new(prompt_tokens, completion_tokens),
            }),
            Reply::Fail(err) => Err(err),
        }
    }
}

// =============================================================================
// Notifier
// =============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    fired: Mutex<Vec<(String, AlertType)>>,
}

impl RecordingNotifier {
    pub fn fired(&self) -> Vec<(String, AlertType)> {
        self.fired.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, alert: &BudgetAlert) {
        self.fired
            .lock()
            .push((alert.tenant_id.clone(), alert.alert_type));
    }
}

// =============================================================================
// Engine Builders
// =============================================================================

pub const STRATEGY_JSON: &str = r#"{"objectives": ["grow"], "channels": ["email"], "timeline": "Q3"}"#;
pub const CONTENT_JSON: &str = r#"{"headline": "Hi", "body": "Fresh beans", "call_to_action": "Shop"}"#;
pub const REPLY_JSON: &str = r#"{"reply": "Sorry about that!", "tone": "warm"}"#;

/// Everything a handler test needs to poke at.
pub struct TestEngine {
    pub ctx: Arc<EngineContext>,
    pub provider: Arc<ScriptedProvider>,
    pub interactions: Arc<MemoryInteractionLog>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
}

/// Config with millisecond backoff so tests stay fast
pub fn fast_config() -> TollgateConfig {
    let mut config = TollgateConfig::default();
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 10;
    config
}

pub fn engine_with(provider: Arc<ScriptedProvider>, config: TollgateConfig) -> TestEngine {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
    ));
    let directory = StaticTenantDirectory::new()
        .with_tenant("acme", "Acme Coffee", Tier::Free)
        .with_tenant("globex", "Globex", Tier::Pro)
        .with_campaign(
            "acme",
            CampaignContext {
                campaign_id: "spring".to_string(),
                name: "Spring Launch".to_string(),
                objective: Some("awareness".to_string()),
            },
        );
    let interactions = Arc::new(MemoryInteractionLog::new());
    let notifier = Arc::new(RecordingNotifier::default());

    let collaborators = Collaborators {
        tenants: Arc::new(directory),
        prompts: Arc::new(TemplatePromptBuilder),
        safety: Arc::new(KeywordSafetyValidator::new(["miracle cure"])),
        schemas: Arc::new(JsonSchemaValidator),
        interactions: interactions.clone(),
    };
    let ctx = Arc::new(EngineContext::from_config(
        &config,
        provider.clone(),
        collaborators,
        notifier.clone(),
        clock.clone(),
    ));

    TestEngine {
        ctx,
        provider,
        interactions,
        notifier,
        clock,
    }
}

pub fn engine(provider: Arc<ScriptedProvider>) -> TestEngine {
    engine_with(provider, fast_config())
}
