//! Domain-level error taxonomy for airlab.

/// Airlab domain errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid pipeline input: {0}")]
    InvalidInput(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task {task_id} is {status}, expected {expected}")]
    InvalidTaskState {
        task_id: String,
        status: String,
        expected: String,
    },

    #[error("candidate producer error: {0}")]
    Producer(String),

    #[error("candidate evaluator error: {0}")]
    Evaluator(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for airlab domain operations.
pub type Result<T> = std::result::Result<T, CoreError>;
