//! Error taxonomy for the GitHub Actions integration.
//!
//! Splits failures into:
//! - retryable (5xx, 429, transport) — absorbed by the client's backoff,
//! - fatal (other 4xx, malformed input) — raised immediately,
//! - expected absence (404) — a distinct variant so callers can treat
//!   "not there yet" as keep-waiting rather than an error,
//! - workflow failure — the monitored job itself concluded unsuccessfully.

use airlab_core::{RunConclusion, RunStatus};

/// Errors produced by the GitHub Actions integration.
#[derive(Debug, thiserror::Error)]
pub enum ActionsError {
    #[error("github api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("retry budget exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("git-lfs pointer at {0}: content not usable")]
    LfsPointer(String),

    #[error("workflow '{workflow}' failed: status {status:?}, conclusion {conclusion:?}")]
    WorkflowFailed {
        workflow: String,
        status: RunStatus,
        conclusion: Option<RunConclusion>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ActionsError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ActionsError::Api { status, .. } => Some(*status),
            ActionsError::NotFound(_) => Some(404),
            ActionsError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Short variant label for task-status error strings.
    pub fn kind(&self) -> &'static str {
        match self {
            ActionsError::Api { .. } => "Api",
            ActionsError::NotFound(_) => "NotFound",
            ActionsError::Transport(_) => "Transport",
            ActionsError::RetriesExhausted { .. } => "RetriesExhausted",
            ActionsError::LfsPointer(_) => "LfsPointer",
            ActionsError::WorkflowFailed { .. } => "WorkflowFailed",
            ActionsError::Serialization(_) => "Serialization",
        }
    }
}

/// Result type for GitHub Actions operations.
pub type Result<T> = std::result::Result<T, ActionsError>;
