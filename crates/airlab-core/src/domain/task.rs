//! Pipeline task lifecycle records.
//!
//! One `TaskRecord` exists per top-level pipeline invocation (an experiment
//! or hypothesis task). Records are owned by the task that created them;
//! the status endpoint only reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a pipeline task, as surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Whether the task can still make progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// Stored state of one pipeline task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task identifier (UUID string).
    pub task_id: String,

    /// Current lifecycle status.
    pub status: TaskStatus,

    /// `"<Kind>: <message>"` on failure; the full error chain is only
    /// logged server-side.
    pub error: Option<String>,

    /// Partial or final result payload, if the task produced one.
    pub result: Option<serde_json::Value>,

    /// Set by the cancel endpoint; in-flight loops check this each tick.
    pub cancel_requested: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Create a fresh pending record.
    pub fn new(task_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Pending,
            error: None,
            result: None,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
        }
    }
}
