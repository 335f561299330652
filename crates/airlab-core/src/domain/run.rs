//! Remote workflow run model.
//!
//! Mirrors the GitHub Actions run object: `status` describes where a run is
//! in its lifecycle, `conclusion` classifies the terminal outcome and is
//! null until the run completes. Runs are observed, never mutated.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a remote workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Waiting,
    Pending,
    Completed,
    /// Any status string this client does not recognize.
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Whether the run is still pending or executing.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunStatus::Queued | RunStatus::InProgress | RunStatus::Waiting | RunStatus::Pending
        )
    }

    /// Whether the run reached a terminal status.
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

/// Terminal outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    Success,
    Failure,
    Neutral,
    Skipped,
    Cancelled,
    TimedOut,
    StartupFailure,
    #[serde(other)]
    Unknown,
}

impl RunConclusion {
    /// Whether this conclusion counts as the workflow having passed.
    ///
    /// Neutral and skipped runs did not fail anything; everything else
    /// outside `Success` is a failure.
    pub fn passed(&self) -> bool {
        matches!(
            self,
            RunConclusion::Success | RunConclusion::Neutral | RunConclusion::Skipped
        )
    }
}

/// One observed workflow run, as returned by the run-listing API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Opaque run identifier assigned by the remote CI system.
    pub id: u64,

    /// Lifecycle status.
    pub status: RunStatus,

    /// Terminal outcome; `None` while the run is still active.
    pub conclusion: Option<RunConclusion>,
}

impl WorkflowRun {
    /// Whether this run is completed and its conclusion counts as passed.
    ///
    /// A completed run with a missing conclusion is treated as not passed.
    pub fn passed(&self) -> bool {
        self.status.is_completed() && self.conclusion.map(|c| c.passed()).unwrap_or(false)
    }
}

/// Final result of one poll operation.
///
/// Either fully populated (a terminal run with a known id and status) or
/// fully null (timeout / cancellation) — never a partial mix. Timeout and
/// cancellation are normal return values, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PollOutcome {
    /// The tracked run reached a stable terminal state.
    Terminal {
        run_id: u64,
        status: RunStatus,
        conclusion: Option<RunConclusion>,
    },

    /// The configured wall-clock timeout elapsed before any run settled.
    TimedOut,

    /// A cancel request was observed mid-poll.
    Cancelled,
}

impl PollOutcome {
    /// Whether the poll ended with a terminal run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollOutcome::Terminal { .. })
    }

    /// The terminal run's conclusion, if there is one.
    pub fn conclusion(&self) -> Option<RunConclusion> {
        match self {
            PollOutcome::Terminal { conclusion, .. } => *conclusion,
            _ => None,
        }
    }

    /// Whether the poll ended with a terminal run that passed.
    pub fn passed(&self) -> bool {
        self.conclusion().map(|c| c.passed()).unwrap_or(false)
    }
}
