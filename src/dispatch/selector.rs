//! Model selection by task type and priority.

use crate::task::{Priority, TaskType};

/// Model used when no specific mapping exists
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Pick the model for a `(task_type, priority)` pair.
///
/// Low-priority work defaults to [`DEFAULT_MODEL`]; planning-heavy tasks get
/// stronger models as priority rises.
pub fn select_model(task_type: TaskType, priority: Priority) -> &'static str {
    use Priority::*;
    use TaskType::*;

    match (task_type, priority) {
        (Strategy, Normal) => "gpt-4o",
        (Strategy, High | Critical) => "gpt-4",

        (Content, Normal) => "gpt-4o-mini",
        (Content, High) => "gpt-4o",
        (Content, Critical) => "gpt-4-turbo",

        (VideoScript, Low | Normal) => "gpt-4o-mini",
        (VideoScript, High | Critical) => "gpt-4-turbo",

        (AnalyticsInsight, Normal | High) => "gpt-4o",
        (AnalyticsInsight, Critical) => "gpt-4",

        (CustomerReply, Normal) => "gpt-4o-mini",
        (CustomerReply, High) => "claude-3-sonnet",
        (CustomerReply, Critical) => "gpt-4o",

        _ => DEFAULT_MODEL,
    }
}
