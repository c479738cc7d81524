//! Task request/result value objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Kind of generation a tenant asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Strategy,
    Content,
    VideoScript,
    AnalyticsInsight,
    CustomerReply,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::Strategy,
        TaskType::Content,
        TaskType::VideoScript,
        TaskType::AnalyticsInsight,
        TaskType::CustomerReply,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Strategy => "strategy",
            TaskType::Content => "content",
            TaskType::VideoScript => "video_script",
            TaskType::AnalyticsInsight => "analytics_insight",
            TaskType::CustomerReply => "customer_reply",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Invalid task type: {}", s))
    }
}

/// Scheduling priority of a request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// One unit of work submitted by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_type: TaskType,
    pub tenant_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    /// Task-specific inputs, opaque to the engine except for validation
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    /// Absolute cut-off for the whole dispatch, including backoff sleeps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

impl TaskRequest {
    pub fn new(task_type: TaskType, tenant_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            task_type,
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            campaign_id: None,
            priority: Priority::Normal,
            parameters: Map::new(),
            retry_count: 0,
            max_retries: 3,
            created_at: Utc::now(),
            deadline: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_campaign(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = Some(campaign_id.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// String parameter, if present and a string
    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

/// Outcome of one task handler invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub task_type: TaskType,
    pub success: bool,
    /// Structured payload when schema validation passed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_data: Option<Value>,
    /// Raw model output, kept when schema validation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub cost: f64,
    pub tokens_used: u64,
    pub processing_time_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_from_str_accepts_kebab_and_snake() {
        assert_eq!(TaskType::from_str("video-script").unwrap(), TaskType::VideoScript);
        assert_eq!(
            TaskType::from_str("CUSTOMER_REPLY").unwrap(),
            TaskType::CustomerReply
        );
        assert!(TaskType::from_str("poem").is_err());
    }

    #[test]
    fn priority_ordering() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::High < Priority::Critical);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn request_builder_defaults() {
        let request = TaskRequest::new(TaskType::Content, "biz-1", "user-1")
            .with_parameter("topic", "spring sale");
        assert_eq!(request.priority, Priority::Normal);
        assert_eq!(request.max_retries, 3);
        assert_eq!(request.retry_count, 0);
        assert!(request.deadline.is_none());
        assert_eq!(request.parameter_str("topic"), Some("spring sale"));
        assert_eq!(request.parameter_str("missing"), None);
    }

    #[test]
    fn task_type_serde_snake_case() {
        let json = serde_json::to_string(&TaskType::AnalyticsInsight).unwrap();
        assert_eq!(json, "\"analytics_insight\"");
    }
}
