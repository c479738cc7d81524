//! Tollgate - AI request orchestration and cost governance
//!
//! Runs generative-AI tasks on behalf of tenants while enforcing per-tenant
//! daily budgets. Each request is priced before dispatch, paced per priority,
//! retried with exponential backoff on provider failure, and charged at its
//! actual cost afterwards. Budget alerts fire as tenants approach their
//! limits, and usage is rolled up into cached analytics reports.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tollgate::alerting::TracingNotifier;
//! use tollgate::clock::SystemClock;
//! use tollgate::config::TollgateConfig;
//! use tollgate::simulation::*;
//! use tollgate::task::handler::Collaborators;
//! use tollgate::task::{EngineContext, TaskRequest, TaskType};
//! use tollgate::catalog::Tier;
//!
//! # async fn run() -> Result<(), tollgate::error::EngineError> {
//! let ctx = Arc::new(EngineContext::from_config(
//!     &TollgateConfig::default(),
//!     Arc::new(SimulatedProvider::new(std::time::Duration::ZERO)),
//!     Collaborators {
//!         tenants: Arc::new(StaticTenantDirectory::new().with_tenant("acme", "Acme", Tier::Pro)),
//!         prompts: Arc::new(TemplatePromptBuilder),
//!         safety: Arc::new(KeywordSafetyValidator::default()),
//!         schemas: Arc::new(JsonSchemaValidator),
//!         interactions: Arc::new(MemoryInteractionLog::new()),
//!     },
//!     Arc::new(TracingNotifier),
//!     Arc::new(SystemClock),
//! ));
//!
//! let result = ctx
//!     .handler(TaskType::Strategy)
//!     .handle(TaskRequest::new(TaskType::Strategy, "acme", "user-1"))
//!     .await?;
//! println!("cost: ${:.6}", result.cost);
//! # Ok(())
//! # }
//! ```

pub mod alerting;
pub mod analytics;
pub mod catalog;
pub mod cli;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod provider;
pub mod simulation;
pub mod task;
