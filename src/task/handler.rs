//! Task handler - runs one task request end to end
//!
//! The same pipeline serves all five task types:
//!
//! 1. Resolve tenant (and campaign) context
//! 2. Check task parameters and build the task-specific prompt
//! 3. Safety check
//! 4. Reserve budget, then dispatch with retry
//! 5. Schema-validate the raw output
//! 6. Record cost in the ledger
//! 7. Log the interaction
//!
//! Only validation, not-found, safety and quota errors raised before the
//! provider is reached propagate as `Err`. Everything after that is folded
//! into a `TaskResult` with `success: false`.

use super::ports::{
    CampaignContext, InteractionLog, InteractionRecord, PromptBuilder, PromptConfig,
    SafetyValidator, SafetyVerdict, SchemaValidator, TenantContext, TenantDirectory,
};
use super::{TaskRequest, TaskResult, TaskType};
use crate::alerting::{AlertEngine, Notifier};
use crate::catalog::PricingTable;
use crate::clock::Clock;
use crate::config::TollgateConfig;
use crate::dispatch::{select_model, Dispatcher, RateLimiter};
use crate::error::EngineError;
use crate::ledger::BudgetLedger;
use crate::logging::truncate_prompt;
use crate::provider::{AiProvider, ProviderResponse};
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Rough token count for a prompt: 4 chars per token plus 15% headroom.
pub fn estimate_prompt_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as f64;
    ((chars / 4.0) * 1.15).ceil() as u64
}

/// Host-supplied collaborators.
pub struct Collaborators {
    pub tenants: Arc<dyn TenantDirectory>,
    pub prompts: Arc<dyn PromptBuilder>,
    pub safety: Arc<dyn SafetyValidator>,
    pub schemas: Arc<dyn SchemaValidator>,
    pub interactions: Arc<dyn InteractionLog>,
}

/// Shared services for every handler. Built once per process.
pub struct EngineContext {
    pub ledger: Arc<BudgetLedger>,
    pub dispatcher: Arc<Dispatcher>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub prompts: Arc<dyn PromptBuilder>,
    pub safety: Arc<dyn SafetyValidator>,
    pub schemas: Arc<dyn SchemaValidator>,
    pub interactions: Arc<dyn InteractionLog>,
    /// Count the prompt's `max_tokens` in the pre-flight estimate
    pub reserve_output_tokens: bool,
    pub enable_content_logging: bool,
    /// `retry.max_retries`, applied by [`EngineContext::request`]
    pub max_retries: u32,
}

impl EngineContext {
    pub fn from_config(
        config: &TollgateConfig,
        provider: Arc<dyn AiProvider>,
        collaborators: Collaborators,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let alerts = Arc::new(AlertEngine::new(config.alerts.rules.clone(), notifier));
        let ledger = BudgetLedger::new(config.ledger.clone(), PricingTable::new(), alerts, clock);
        let dispatcher = Dispatcher::new(
            provider,
            RateLimiter::new(config.rate_limits.clone()),
            &config.retry,
        );

        Self {
            ledger: Arc::new(ledger),
            dispatcher: Arc::new(dispatcher),
            tenants: collaborators.tenants,
            prompts: collaborators.prompts,
            safety: collaborators.safety,
            schemas: collaborators.schemas,
            interactions: collaborators.interactions,
            reserve_output_tokens: config.ledger.estimate_output_reserve,
            enable_content_logging: config.logging.enable_content_logging,
            max_retries: config.retry.max_retries,
        }
    }

    /// New request carrying the configured retry budget
    pub fn request(
        &self,
        task_type: TaskType,
        tenant_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> TaskRequest {
        TaskRequest::new(task_type, tenant_id, user_id).with_max_retries(self.max_retries)
    }

    /// Handler for `task_type`
    pub fn handler(self: &Arc<Self>, task_type: TaskType) -> TaskHandler {
        TaskHandler::new(task_type, Arc::clone(self))
    }
}

/// Post-dispatch outcome, before it becomes a `TaskResult`.
struct Completion<'a> {
    response: Option<&'a ProviderResponse>,
    model: String,
    result_data: Option<Value>,
    raw_content: Option<String>,
    error: Option<String>,
    cost: f64,
}

/// Runs requests of one task type.
#[derive(Clone)]
pub struct TaskHandler {
    task_type: TaskType,
    ctx: Arc<EngineContext>,
}

impl TaskHandler {
    pub fn new(task_type: TaskType, ctx: Arc<EngineContext>) -> Self {
        Self { task_type, ctx }
    }

    pub fn strategy(ctx: Arc<EngineContext>) -> Self {
        Self::new(TaskType::Strategy, ctx)
    }

    pub fn content(ctx: Arc<EngineContext>) -> Self {
        Self::new(TaskType::Content, ctx)
    }

    pub fn video_script(ctx: Arc<EngineContext>) -> Self {
        Self::new(TaskType::VideoScript, ctx)
    }

    pub fn analytics_insight(ctx: Arc<EngineContext>) -> Self {
        Self::new(TaskType::AnalyticsInsight, ctx)
    }

    pub fn customer_reply(ctx: Arc<EngineContext>) -> Self {
        Self::new(TaskType::CustomerReply, ctx)
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    /// Structural checks that need no tenant context
    fn validate_request(&self, request: &TaskRequest) -> Result<(), EngineError> {
        if request.task_type != self.task_type {
            return Err(EngineError::Validation(format!(
                "{} handler cannot run a {} task",
                self.task_type, request.task_type
            )));
        }
        if request.tenant_id.trim().is_empty() {
            return Err(EngineError::Validation("tenant_id is required".to_string()));
        }
        if request.user_id.trim().is_empty() {
            return Err(EngineError::Validation("user_id is required".to_string()));
        }
        Ok(())
    }

    /// Task-specific parameter checks, run once the tenant is resolved
    fn validate_parameters(&self, request: &TaskRequest) -> Result<(), EngineError> {
        match self.task_type {
            TaskType::CustomerReply => {
                let has_message = request
                    .parameter_str("message")
                    .is_some_and(|m| !m.trim().is_empty());
                if !has_message {
                    return Err(EngineError::Validation(
                        "customer reply requires a non-empty 'message' parameter".to_string(),
                    ));
                }
            }
            TaskType::AnalyticsInsight => {
                if !request.parameters.get("metrics").is_some_and(Value::is_object) {
                    return Err(EngineError::Validation(
                        "analytics insight requires a 'metrics' object parameter".to_string(),
                    ));
                }
            }
            TaskType::Strategy | TaskType::Content | TaskType::VideoScript => {}
        }
        Ok(())
    }

    fn build_prompt(
        &self,
        tenant: &TenantContext,
        campaign: Option<&CampaignContext>,
        parameters: &Map<String, Value>,
    ) -> Result<PromptConfig, EngineError> {
        let prompts = &self.ctx.prompts;
        match self.task_type {
            TaskType::Strategy => prompts.build_strategy_prompt(tenant, campaign, parameters),
            TaskType::Content => prompts.build_content_prompt(tenant, campaign, parameters),
            TaskType::VideoScript => {
                prompts.build_video_script_prompt(tenant, campaign, parameters)
            }
            TaskType::AnalyticsInsight => {
                prompts.build_analytics_insight_prompt(tenant, campaign, parameters)
            }
            TaskType::CustomerReply => {
                prompts.build_customer_reply_prompt(tenant, campaign, parameters)
            }
        }
    }

    /// Run one request.
    pub async fn handle(&self, request: TaskRequest) -> Result<TaskResult, EngineError> {
        let started = Instant::now();
        let ctx = &self.ctx;
        self.validate_request(&request)?;

        let tenant = ctx
            .tenants
            .tenant(&request.tenant_id)
            .await
            .ok_or_else(|| EngineError::tenant_not_found(&request.tenant_id))?;

        let campaign = match &request.campaign_id {
            Some(campaign_id) => Some(
                ctx.tenants
                    .campaign(&request.tenant_id, campaign_id)
                    .await
                    .ok_or_else(|| EngineError::NotFound {
                        kind: "Campaign",
                        id: campaign_id.clone(),
                    })?,
            ),
            None => None,
        };
        ctx.ledger.assign_tier(&request.tenant_id, tenant.tier);

        self.validate_parameters(&request)?;
        let prompt = self.build_prompt(&tenant, campaign.as_ref(), &request.parameters)?;

        if let SafetyVerdict::Blocked(reason) = ctx.safety.validate(&request, &prompt).await {
            tracing::warn!(
                tenant_id = %request.tenant_id,
                task_type = %self.task_type,
                reason = %reason,
                "Prompt blocked by safety check"
            );
            return Err(EngineError::SafetyBlocked(reason));
        }

        let model = select_model(request.task_type, request.priority);
        let mut estimated_tokens = estimate_prompt_tokens(&prompt.system_prompt)
            + estimate_prompt_tokens(&prompt.user_prompt);
        if ctx.reserve_output_tokens {
            estimated_tokens += prompt.max_tokens as u64;
        }
        let reservation = ctx
            .ledger
            .reserve(&request.tenant_id, estimated_tokens, model)?;

        let task_id = Uuid::new_v4().to_string();
        if let Some(preview) = truncate_prompt(&prompt, ctx.enable_content_logging) {
            tracing::debug!(task_id = %task_id, prompt_preview = %preview, "Dispatching task");
        }

        let outcome = match ctx
            .dispatcher
            .execute_with_retry(&task_id, &prompt, &request, tenant.tier)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) if !err.reached_provider() && err.error.is_pre_dispatch() => {
                return Err(err.into_inner());
            }
            Err(err) => {
                drop(reservation);
                let completion = Completion {
                    response: None,
                    model: model.to_string(),
                    result_data: None,
                    raw_content: None,
                    error: Some(err.to_string()),
                    cost: 0.0,
                };
                return Ok(self.complete(task_id, &request, &prompt, started, completion));
            }
        };

        let response = outcome.response;
        let cost = ctx.ledger.calculate_cost(&response);
        let parsed = ctx.schemas.validate(&response.content, &prompt.schema_type);
        let recorded = ctx
            .ledger
            .commit(reservation, &response, cost, request.task_type);

        let (result_data, raw_content, error) = match (parsed, recorded) {
            (Ok(data), Ok(_)) => (Some(data), None, None),
            (Ok(data), Err(quota)) => (Some(data), None, Some(quota.to_string())),
            (Err(invalid), _) => (None, Some(response.content.clone()), Some(invalid.to_string())),
        };

        let completion = Completion {
            response: Some(&response),
            model: response.model.clone(),
            result_data,
            raw_content,
            error,
            cost,
        };
        Ok(self.complete(task_id, &request, &prompt, started, completion))
    }

    fn complete(
        &self,
        task_id: String,
        request: &TaskRequest,
        prompt: &PromptConfig,
        started: Instant,
        completion: Completion<'_>,
    ) -> TaskResult {
        let success = completion.error.is_none();
        let tokens_used = completion.response.map_or(0, ProviderResponse::tokens_used);

        self.ctx.interactions.log_interaction(InteractionRecord {
            task_id: task_id.clone(),
            tenant_id: request.tenant_id.clone(),
            user_id: request.user_id.clone(),
            task_type: self.task_type,
            prompt: prompt.user_prompt.clone(),
            response: completion.response.map(|r| r.content.clone()),
            model: Some(completion.model.clone()),
            cost: if success { completion.cost } else { 0.0 },
            success,
            error: completion.error.clone(),
        });
        crate::metrics::record_task(self.task_type, success);

        let processing_time_seconds = started.elapsed().as_secs_f64();
        if success {
            tracing::info!(
                task_id = %task_id,
                tenant_id = %request.tenant_id,
                task_type = %self.task_type,
                model = %completion.model,
                cost_usd = completion.cost,
                tokens = tokens_used,
                processing_time_seconds,
                "Task completed"
            );
        } else {
            tracing::warn!(
                task_id = %task_id,
                tenant_id = %request.tenant_id,
                task_type = %self.task_type,
                model = %completion.model,
                error = completion.error.as_deref().unwrap_or_default(),
                "Task failed"
            );
        }

        TaskResult {
            task_id,
            task_type: self.task_type,
            success,
            result_data: completion.result_data,
            raw_content: completion.raw_content,
            error: completion.error,
            cost: completion.cost,
            tokens_used,
            processing_time_seconds,
            model_used: Some(completion.model),
            completed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_prompt_tokens_adds_headroom() {
        assert_eq!(estimate_prompt_tokens(""), 0);
        // 400 chars -> 100 tokens -> 115 with headroom
        assert_eq!(estimate_prompt_tokens(&"a".repeat(400)), 115);
        // counts chars, not bytes
        assert_eq!(estimate_prompt_tokens(&"é".repeat(400)), 115);
    }
}
