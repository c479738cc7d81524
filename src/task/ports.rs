//! Collaborators the task handlers depend on.
//!
//! The engine owns budgeting, model selection and dispatch. Everything else a
//! handler needs (tenant data, prompt text, content checks, schema parsing,
//! persistence) is supplied by the host through these traits.

use super::{TaskRequest, TaskType};
use crate::catalog::Tier;
use crate::error::EngineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tenant data a prompt is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: String,
    pub name: String,
    pub tier: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_voice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignContext {
    pub campaign_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
}

/// Looks up tenants and their campaigns.
#[async_trait]
pub trait TenantDirectory: Send + Sync + 'static {
    async fn tenant(&self, tenant_id: &str) -> Option<TenantContext>;

    async fn campaign(&self, tenant_id: &str, campaign_id: &str) -> Option<CampaignContext>;
}

/// Everything the dispatcher needs to make one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Name of the schema the response must satisfy
    pub schema_type: String,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

/// Builds task-specific prompts.
pub trait PromptBuilder: Send + Sync + 'static {
    fn build_strategy_prompt(
        &self,
        tenant: &TenantContext,
        campaign: Option<&CampaignContext>,
        parameters: &Map<String, Value>,
    ) -> Result<PromptConfig, EngineError>;

    fn build_content_prompt(
        &self,
        tenant: &TenantContext,
        campaign: Option<&CampaignContext>,
        parameters: &Map<String, Value>,
    ) -> Result<PromptConfig, EngineError>;

    fn build_video_script_prompt(
        &self,
        tenant: &TenantContext,
        campaign: Option<&CampaignContext>,
        parameters: &Map<String, Value>,
    ) -> Result<PromptConfig, EngineError>;

    fn build_analytics_insight_prompt(
        &self,
        tenant: &TenantContext,
        campaign: Option<&CampaignContext>,
        parameters: &Map<String, Value>,
    ) -> Result<PromptConfig, EngineError>;

    fn build_customer_reply_prompt(
        &self,
        tenant: &TenantContext,
        campaign: Option<&CampaignContext>,
        parameters: &Map<String, Value>,
    ) -> Result<PromptConfig, EngineError>;
}

/// Outcome of a content/compliance check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    Allowed,
    Blocked(String),
}

#[async_trait]
pub trait SafetyValidator: Send + Sync + 'static {
    async fn validate(&self, request: &TaskRequest, prompt: &PromptConfig) -> SafetyVerdict;
}

/// Parses raw model output into the structure named by `schema_type`.
pub trait SchemaValidator: Send + Sync + 'static {
    /// Fails with `EngineError::Validation` on malformed or non-conforming output
    fn validate(&self, raw_content: &str, schema_type: &str) -> Result<Value, EngineError>;
}

/// One prompt/response exchange, as handed to the interaction log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionRecord {
    pub task_id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub task_type: TaskType,
    pub prompt: String,
    pub response: Option<String>,
    pub model: Option<String>,
    /// Zero on every failure path
    pub cost: f64,
    pub success: bool,
    pub error: Option<String>,
}

/// Fire-and-forget persistence of interactions. Must not block or fail.
pub trait InteractionLog: Send + Sync + 'static {
    fn log_interaction(&self, record: InteractionRecord);
}
