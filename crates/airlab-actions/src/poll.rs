//! Workflow run poller.
//!
//! Repeatedly queries the remote run listing until the most recent run on
//! the target branch settles, a wall-clock timeout elapses, or a cancel
//! request is observed. One dispatch can trigger a cascade of dependent
//! runs, so a completion is only final once the same run id has been seen
//! completed on two consecutive checks; the first sighting is the
//! [`PollPhase::RunCompletedTransient`] state, which re-arms the wait to
//! catch a chained run appearing.
//!
//! The poller performs no writes; re-invoking it after a crash re-derives
//! state from the remote run history.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use airlab_core::{CancelSignal, PollOutcome, WorkflowRun};

use crate::client::GithubRepo;
use crate::error::{ActionsError, Result};

/// Seam for querying remote run state.
#[async_trait]
pub trait RunsProvider: Send + Sync {
    /// Most recent runs on a branch, newest first.
    async fn latest_runs(&self, branch: &str) -> Result<Vec<WorkflowRun>>;

    /// Human-readable failure details for a run (failed jobs/steps).
    async fn failure_details(&self, run_id: u64) -> Result<String>;
}

/// Poller timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between poll ticks (milliseconds).
    pub poll_interval_ms: u64,

    /// Wall-clock budget for the whole wait (milliseconds). The default
    /// is 100 hours; the monitored jobs are long-running GPU runs.
    pub timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 30_000,
            timeout_ms: 100 * 60 * 60 * 1000,
        }
    }
}

/// Poll loop state, logged on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    /// No run has appeared on the branch yet.
    NoRunDetected,
    /// The tracked run is queued or executing.
    RunPendingOrRunning,
    /// A completion was just observed; waiting one more cycle to see
    /// whether it triggers a chained run.
    RunCompletedTransient,
    /// The same run was completed on two consecutive checks.
    RunCompletedFinal,
    /// The wall-clock budget elapsed.
    TimedOut,
}

/// Waits for the most recent run on a branch to settle.
pub struct RunPoller<'a> {
    provider: &'a dyn RunsProvider,
    config: PollConfig,
    /// Workflow name used in logs and failure classification.
    workflow: String,
}

impl<'a> RunPoller<'a> {
    pub fn new(provider: &'a dyn RunsProvider, config: PollConfig, workflow: impl Into<String>) -> Self {
        Self {
            provider,
            config,
            workflow: workflow.into(),
        }
    }

    /// Poll until the run settles, the timeout elapses, or a cancel is
    /// requested. Timeout and cancellation are normal outcomes carrying
    /// no run data; a terminal outcome is fully populated.
    ///
    /// Failed conclusions trigger a diagnostic fetch (failed job details
    /// are logged) before returning; fetch errors there are swallowed.
    pub async fn wait_for_completion(
        &self,
        branch: &str,
        cancel: Option<&dyn CancelSignal>,
    ) -> Result<PollOutcome> {
        let started = Instant::now();
        let mut polls = 0u32;
        let mut tracked: Option<u64> = None;
        let mut last_completed: Option<u64> = None;
        let mut phase = PollPhase::NoRunDetected;

        loop {
            if let Some(signal) = cancel {
                if signal.is_cancelled().await {
                    info!(workflow = %self.workflow, polls, "cancel requested; abandoning poll");
                    return Ok(PollOutcome::Cancelled);
                }
            }

            if started.elapsed().as_millis() as u64 >= self.config.timeout_ms {
                warn!(
                    workflow = %self.workflow,
                    polls,
                    timeout_ms = self.config.timeout_ms,
                    "poll timed out before the run settled"
                );
                return Ok(PollOutcome::TimedOut);
            }

            polls += 1;
            let runs = match self.provider.latest_runs(branch).await {
                Ok(runs) => runs,
                // The workflow has never run on this branch; keep waiting.
                Err(ActionsError::NotFound(_)) => Vec::new(),
                Err(e) => return Err(e),
            };

            match runs.first() {
                None => {
                    phase = PollPhase::NoRunDetected;
                }
                Some(run) if run.status.is_completed() => {
                    if last_completed == Some(run.id) {
                        phase = PollPhase::RunCompletedFinal;
                        return self.finalize(run, polls, phase).await;
                    }
                    // First completion sighting, or a chained run replaced
                    // the one we were tracking. Re-arm and check again.
                    tracked = Some(run.id);
                    last_completed = Some(run.id);
                    phase = PollPhase::RunCompletedTransient;
                }
                Some(run) => {
                    tracked = Some(run.id);
                    last_completed = None;
                    phase = PollPhase::RunPendingOrRunning;
                }
            }

            debug!(
                workflow = %self.workflow,
                branch,
                polls,
                ?phase,
                tracked_run_id = ?tracked,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "poll tick"
            );

            tokio::time::sleep(std::time::Duration::from_millis(self.config.poll_interval_ms))
                .await;
        }
    }

    async fn finalize(&self, run: &WorkflowRun, polls: u32, phase: PollPhase) -> Result<PollOutcome> {
        if run.passed() {
            info!(
                workflow = %self.workflow,
                run_id = run.id,
                polls,
                ?phase,
                conclusion = ?run.conclusion,
                "workflow run settled successfully"
            );
        } else {
            warn!(
                workflow = %self.workflow,
                run_id = run.id,
                polls,
                conclusion = ?run.conclusion,
                "workflow run settled with a failing conclusion"
            );
            match self.provider.failure_details(run.id).await {
                Ok(details) => warn!(run_id = run.id, %details, "run failure details"),
                Err(e) => warn!(run_id = run.id, error = %e, "could not fetch failure details"),
            }
        }

        Ok(PollOutcome::Terminal {
            run_id: run.id,
            status: run.status,
            conclusion: run.conclusion,
        })
    }
}

#[async_trait]
impl RunsProvider for GithubRepo {
    async fn latest_runs(&self, branch: &str) -> Result<Vec<WorkflowRun>> {
        let path = format!("/repos/{}/actions/runs", self.repo().full_name());
        let value = self
            .client()
            .get_json(
                &path,
                &[
                    ("branch", branch.to_string()),
                    ("per_page", "5".to_string()),
                ],
            )
            .await?;

        // Tolerate malformed entries; a run we cannot parse is a run we
        // cannot track.
        let runs = value
            .get("workflow_runs")
            .and_then(|v| v.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| serde_json::from_value::<WorkflowRun>(entry.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Ok(runs)
    }

    async fn failure_details(&self, run_id: u64) -> Result<String> {
        let path = format!(
            "/repos/{}/actions/runs/{}/jobs",
            self.repo().full_name(),
            run_id
        );
        let value = self.client().get_json(&path, &[]).await?;

        let mut details = Vec::new();
        if let Some(jobs) = value.get("jobs").and_then(|v| v.as_array()) {
            for job in jobs {
                let name = job.get("name").and_then(|v| v.as_str()).unwrap_or("unknown");
                let conclusion = job
                    .get("conclusion")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                if conclusion != "success" && conclusion != "skipped" {
                    details.push(format!("job '{name}' concluded {conclusion}"));
                }
            }
        }

        if details.is_empty() {
            Ok("no failed jobs reported".to_string())
        } else {
            Ok(details.join("; "))
        }
    }
}
