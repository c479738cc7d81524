//! Task requests, results and the handlers that run them.

pub mod handler;
pub mod ports;
pub mod types;

pub use handler::{estimate_prompt_tokens, EngineContext, TaskHandler};
pub use ports::{
    CampaignContext, InteractionLog, InteractionRecord, PromptBuilder, PromptConfig,
    SafetyValidator, SafetyVerdict, SchemaValidator, TenantContext, TenantDirectory,
};
pub use types::{Priority, TaskRequest, TaskResult, TaskType};
