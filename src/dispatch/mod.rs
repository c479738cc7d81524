//! Request dispatcher - model selection, pacing and retry around one provider call
//!
//! For each attempt in `0..=max_retries`:
//!
//! 1. Claim a [`RatePermit`] for the request's `(tenant, priority)` lane.
//! 2. Call the provider with the selected model.
//! 3. On success, return immediately.
//! 4. On failure, sleep `base_delay * 2^attempt` (capped) and try again,
//!    or give up once retries run out.
//!
//! Pacing rejections are quota errors and end the loop at once. A request
//! deadline bounds every call and every backoff sleep.

pub mod backoff;
pub mod rate_limit;
pub mod selector;

pub use backoff::ExponentialBackoff;
pub use rate_limit::{RateLimiter, RatePermit};
pub use selector::{select_model, DEFAULT_MODEL};

use crate::catalog::Tier;
use crate::config::RetryConfig;
use crate::error::EngineError;
use crate::logging::extract_tokens;
use crate::provider::{AiProvider, GenerationConfig, ProviderError, ProviderResponse};
use crate::task::{PromptConfig, TaskRequest};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;

/// A successful dispatch.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub response: ProviderResponse,
    /// Provider calls made, including the successful one
    pub attempts: u32,
    /// Model requested from the provider
    pub model: String,
}

/// A failed dispatch and how many provider calls it made.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct DispatchError {
    #[source]
    pub error: EngineError,
    /// Zero when the request was refused before reaching the provider
    pub provider_calls: u32,
}

impl DispatchError {
    fn new(error: EngineError, provider_calls: u32) -> Self {
        Self {
            error,
            provider_calls,
        }
    }

    pub fn reached_provider(&self) -> bool {
        self.provider_calls > 0
    }

    pub fn into_inner(self) -> EngineError {
        self.error
    }
}

impl From<DispatchError> for EngineError {
    fn from(err: DispatchError) -> Self {
        err.error
    }
}

pub struct Dispatcher {
    provider: Arc<dyn AiProvider>,
    limiter: RateLimiter,
    backoff: ExponentialBackoff,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn AiProvider>, limiter: RateLimiter, retry: &RetryConfig) -> Self {
        Self {
            provider,
            limiter,
            backoff: ExponentialBackoff::from(retry),
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn backoff(&self) -> &ExponentialBackoff {
        &self.backoff
    }

    /// Run one task's generation with pacing, retry and backoff.
    pub async fn execute_with_retry(
        &self,
        task_id: &str,
        prompt: &PromptConfig,
        request: &TaskRequest,
        tier: Tier,
    ) -> Result<DispatchOutcome, DispatchError> {
        let max_retries = request.max_retries;
        let model = select_model(request.task_type, request.priority);
        let generation = GenerationConfig {
            model: model.to_string(),
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
            stop_sequences: prompt.stop_sequences.clone(),
        };

        // Anchor the wall-clock deadline to the runtime clock once
        let deadline = request.deadline.map(|at| {
            let remaining = (at - chrono::Utc::now()).to_std().unwrap_or_default();
            Instant::now() + remaining
        });

        for attempt in 0..=max_retries {
            let remaining = match deadline {
                Some(at) => {
                    let now = Instant::now();
                    if now >= at {
                        tracing::warn!(task_id, attempt, "Deadline passed before provider call");
                        return Err(DispatchError::new(
                            EngineError::DeadlineExceeded { attempts: attempt },
                            attempt,
                        ));
                    }
                    Some(at - now)
                }
                None => None,
            };

            let permit = self
                .limiter
                .acquire(&request.tenant_id, request.priority, tier)
                .map_err(|err| DispatchError::new(err, attempt))?;

            tracing::debug!(
                task_id,
                tenant_id = %request.tenant_id,
                model,
                attempt = attempt + 1,
                provider = self.provider.name(),
                "Calling provider"
            );

            let call = self
                .provider
                .generate(&prompt.user_prompt, &prompt.system_prompt, &generation);
            let result = match remaining {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::timeout("request deadline reached")),
                },
                None => call.await,
            };
            drop(permit);

            let attempts = attempt + 1;
            let err = match result {
                Ok(response) => {
                    crate::metrics::record_provider_attempt(model, "success");
                    let (prompt_tokens, completion_tokens, total_tokens) =
                        extract_tokens(&response);
                    tracing::info!(
                        task_id,
                        model,
                        attempts,
                        prompt_tokens,
                        completion_tokens,
                        total_tokens,
                        "Provider call succeeded"
                    );
                    return Ok(DispatchOutcome {
                        response,
                        attempts,
                        model: model.to_string(),
                    });
                }
                Err(err) => err,
            };

            crate::metrics::record_provider_attempt(model, err.outcome());

            if attempt < max_retries {
                let delay = self.backoff.delay_for(attempt);
                if deadline.is_some_and(|at| Instant::now() + delay >= at) {
                    tracing::warn!(
                        task_id,
                        attempts,
                        error = %err,
                        "Backoff would overrun deadline, giving up"
                    );
                    return Err(DispatchError::new(
                        EngineError::DeadlineExceeded { attempts },
                        attempts,
                    ));
                }

                tracing::warn!(
                    task_id,
                    model,
                    attempt = attempts,
                    transient = err.is_transient(),
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Provider call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if err.is_transient() {
                tracing::warn!(task_id, model, attempts, error = %err, "Retries exhausted");
            } else {
                tracing::error!(
                    task_id,
                    model,
                    attempts,
                    error = %err,
                    "Provider call failed after retries"
                );
            }
            return Err(DispatchError::new(EngineError::from(err), attempts));
        }

        let attempts = max_retries + 1;
        Err(DispatchError::new(
            EngineError::RetriesExhausted { attempts },
            attempts,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::provider::TokenUsage;
    use crate::task::TaskType;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<(), ProviderError>>>,
        calls: Mutex<Vec<(Instant, String)>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<(), ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
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
            self.calls.lock().push((Instant::now(), config.model.clone()));
            let next = self.script.lock().pop_front().unwrap_or(Ok(()));
            next.map(|()| ProviderResponse {
                content: "{\"ok\":true}".to_string(),
                model: config.model.clone(),
                usage: TokenUsage::new(100, 50),
            })
        }
    }

    fn prompt() -> PromptConfig {
        PromptConfig {
            system_prompt: "You are a marketing strategist.".to_string(),
            user_prompt: "Plan a launch.".to_string(),
            schema_type: "strategy".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            stop_sequences: Vec::new(),
        }
    }

    fn dispatcher(provider: Arc<ScriptedProvider>) -> Dispatcher {
        Dispatcher::new(
            provider,
            RateLimiter::new(RateLimitConfig::default()),
            &RetryConfig::default(),
        )
    }

    fn request() -> TaskRequest {
        TaskRequest::new(TaskType::Strategy, "acme", "user-1")
    }

    #[tokio::test(start_paused = true)]
    async fn success_returns_without_retry() {
        let provider = ScriptedProvider::new(vec![Ok(())]);
        let dispatcher = dispatcher(Arc::clone(&provider));
        let outcome = dispatcher
            .execute_with_retry("t1", &prompt(), &request(), Tier::Pro)
            .await
            .unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.model, "gpt-4o");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_back_off_exponentially() {
        let provider = ScriptedProvider::new(vec![
            Err(ProviderError::rate_limited("429")),
            Err(ProviderError::timeout("slow")),
            Err(ProviderError::rate_limited("429")),
            Err(ProviderError::rate_limited("429")),
        ]);
        let dispatcher = dispatcher(Arc::clone(&provider));
        let started = Instant::now();

        let err = dispatcher
            .execute_with_retry("t1", &prompt(), &request(), Tier::Pro)
            .await
            .unwrap_err();

        assert_eq!(err.provider_calls, 4);
        assert!(matches!(err.error, EngineError::ProviderTransient(_)));
        assert_eq!(started.elapsed(), Duration::from_secs(7));

        let calls = provider.calls.lock();
        let gaps: Vec<_> = calls.windows(2).map(|w| w[1].0 - w[0].0).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::timeout("slow")), Ok(())]);
        let dispatcher = dispatcher(Arc::clone(&provider));
        let outcome = dispatcher
            .execute_with_retry("t1", &prompt(), &request(), Tier::Pro)
            .await
            .unwrap();
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_follow_same_retry_policy() {
        let provider = ScriptedProvider::new(vec![
            Err(ProviderError::Permanent("bad request".into())),
            Err(ProviderError::Permanent("bad request".into())),
        ]);
        let dispatcher = dispatcher(Arc::clone(&provider));
        let err = dispatcher
            .execute_with_retry("t1", &prompt(), &request().with_max_retries(1), Tier::Pro)
            .await
            .unwrap_err();
        assert!(matches!(err.error, EngineError::Provider(_)));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_call() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::rate_limited("429"))]);
        let dispatcher = dispatcher(Arc::clone(&provider));
        let err = dispatcher
            .execute_with_retry("t1", &prompt(), &request().with_max_retries(0), Tier::Pro)
            .await
            .unwrap_err();
        assert_eq!(err.provider_calls, 1);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_rejection_is_terminal_and_pre_dispatch() {
        let provider = ScriptedProvider::new(vec![]);
        let dispatcher = dispatcher(Arc::clone(&provider));
        let req = request();
        // Free tier allows 2 tenant-wide in-flight attempts
        let _a = dispatcher.limiter().acquire("acme", req.priority, Tier::Free).unwrap();
        let _b = dispatcher.limiter().acquire("acme", req.priority, Tier::Free).unwrap();

        let err = dispatcher
            .execute_with_retry("t1", &prompt(), &req, Tier::Free)
            .await
            .unwrap_err();
        assert!(!err.reached_provider());
        assert!(matches!(err.error, EngineError::QuotaExceeded { .. }));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_past_deadline_gives_up() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::rate_limited("429"))]);
        let dispatcher = dispatcher(Arc::clone(&provider));
        let req = request().with_deadline(chrono::Utc::now() + chrono::Duration::milliseconds(500));

        let err = dispatcher
            .execute_with_retry("t1", &prompt(), &req, Tier::Pro)
            .await
            .unwrap_err();
        assert!(matches!(err.error, EngineError::DeadlineExceeded { attempts: 1 }));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_skips_provider() {
        let provider = ScriptedProvider::new(vec![]);
        let dispatcher = dispatcher(Arc::clone(&provider));
        let req = request().with_deadline(chrono::Utc::now() - chrono::Duration::seconds(1));

        let err = dispatcher
            .execute_with_retry("t1", &prompt(), &req, Tier::Pro)
            .await
            .unwrap_err();
        assert!(matches!(err.error, EngineError::DeadlineExceeded { attempts: 0 }));
        assert_eq!(provider.call_count(), 0);
    }
}
