//! Poller state-machine tests against a scripted runs provider.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use airlab_actions::{ActionsError, PollConfig, RunPoller, RunsProvider};
use airlab_core::{CancelSignal, PollOutcome, RunConclusion, RunStatus, WorkflowRun};

/// Replays a fixed sequence of run-listing snapshots; once the script is
/// exhausted, the last snapshot repeats (the remote history is stable).
struct ScriptedRuns {
    ticks: Mutex<Vec<Vec<WorkflowRun>>>,
    cursor: AtomicU32,
    list_calls: AtomicU32,
    detail_calls: AtomicU32,
}

impl ScriptedRuns {
    fn new(ticks: Vec<Vec<WorkflowRun>>) -> Self {
        Self {
            ticks: Mutex::new(ticks),
            cursor: AtomicU32::new(0),
            list_calls: AtomicU32::new(0),
            detail_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl RunsProvider for ScriptedRuns {
    async fn latest_runs(&self, _branch: &str) -> Result<Vec<WorkflowRun>, ActionsError> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        let ticks = self.ticks.lock().unwrap();
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) as usize;
        Ok(ticks
            .get(index.min(ticks.len().saturating_sub(1)))
            .cloned()
            .unwrap_or_default())
    }

    async fn failure_details(&self, _run_id: u64) -> Result<String, ActionsError> {
        self.detail_calls.fetch_add(1, Ordering::Relaxed);
        Ok("job 'train' concluded failure".to_string())
    }
}

struct FlagCancel(AtomicBool);

#[async_trait]
impl CancelSignal for FlagCancel {
    async fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

fn run(id: u64, status: RunStatus, conclusion: Option<RunConclusion>) -> WorkflowRun {
    WorkflowRun {
        id,
        status,
        conclusion,
    }
}

fn fast_config() -> PollConfig {
    PollConfig {
        poll_interval_ms: 1,
        timeout_ms: 5_000,
    }
}

#[tokio::test]
async fn test_in_progress_then_completed_success() {
    // dispatch succeeded; first poll sees in_progress, second sees the run
    // completed, third (transient re-check) sees the same run id again.
    let provider = ScriptedRuns::new(vec![
        vec![run(7, RunStatus::InProgress, None)],
        vec![run(7, RunStatus::Completed, Some(RunConclusion::Success))],
        vec![run(7, RunStatus::Completed, Some(RunConclusion::Success))],
    ]);
    let poller = RunPoller::new(&provider, fast_config(), "experiment.yml");

    let outcome = poller.wait_for_completion("main", None).await.unwrap();

    assert_eq!(
        outcome,
        PollOutcome::Terminal {
            run_id: 7,
            status: RunStatus::Completed,
            conclusion: Some(RunConclusion::Success),
        }
    );
    // No diagnostics on success.
    assert_eq!(provider.detail_calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_immediate_failure_is_transient_then_final_with_diagnostics() {
    // Poll immediately sees a completed failure with no prior tracked id:
    // treated as transient, re-polled, then finalized with a diagnostics
    // fetch.
    let provider = ScriptedRuns::new(vec![
        vec![run(3, RunStatus::Completed, Some(RunConclusion::Failure))],
        vec![run(3, RunStatus::Completed, Some(RunConclusion::Failure))],
    ]);
    let poller = RunPoller::new(&provider, fast_config(), "experiment.yml");

    let outcome = poller.wait_for_completion("main", None).await.unwrap();

    assert_eq!(
        outcome,
        PollOutcome::Terminal {
            run_id: 3,
            status: RunStatus::Completed,
            conclusion: Some(RunConclusion::Failure),
        }
    );
    assert!(provider.list_calls.load(Ordering::Relaxed) >= 2);
    assert_eq!(provider.detail_calls.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_chain_detection_reports_the_chained_run() {
    // Run 1 completes, then run 2 appears before the transient re-check:
    // the poller must report run 2's conclusion, not run 1's.
    let provider = ScriptedRuns::new(vec![
        vec![run(1, RunStatus::Completed, Some(RunConclusion::Success))],
        vec![
            run(2, RunStatus::InProgress, None),
            run(1, RunStatus::Completed, Some(RunConclusion::Success)),
        ],
        vec![
            run(2, RunStatus::Completed, Some(RunConclusion::Failure)),
            run(1, RunStatus::Completed, Some(RunConclusion::Success)),
        ],
        vec![
            run(2, RunStatus::Completed, Some(RunConclusion::Failure)),
            run(1, RunStatus::Completed, Some(RunConclusion::Success)),
        ],
    ]);
    let poller = RunPoller::new(&provider, fast_config(), "experiment.yml");

    let outcome = poller.wait_for_completion("main", None).await.unwrap();

    assert_eq!(
        outcome,
        PollOutcome::Terminal {
            run_id: 2,
            status: RunStatus::Completed,
            conclusion: Some(RunConclusion::Failure),
        }
    );
}

#[tokio::test]
async fn test_chained_completion_without_running_phase() {
    // Run A's completion is sighted twice only if no new id appears in
    // between; here run B is already completed at the re-check.
    let provider = ScriptedRuns::new(vec![
        vec![run(10, RunStatus::Completed, Some(RunConclusion::Success))],
        vec![run(11, RunStatus::Completed, Some(RunConclusion::Success))],
        vec![run(11, RunStatus::Completed, Some(RunConclusion::Success))],
    ]);
    let poller = RunPoller::new(&provider, fast_config(), "experiment.yml");

    let outcome = poller.wait_for_completion("main", None).await.unwrap();

    match outcome {
        PollOutcome::Terminal { run_id, .. } => assert_eq!(run_id, 11),
        other => panic!("expected terminal outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn test_no_run_then_run_appears() {
    let provider = ScriptedRuns::new(vec![
        vec![],
        vec![run(5, RunStatus::Queued, None)],
        vec![run(5, RunStatus::Completed, Some(RunConclusion::Success))],
        vec![run(5, RunStatus::Completed, Some(RunConclusion::Success))],
    ]);
    let poller = RunPoller::new(&provider, fast_config(), "experiment.yml");

    let outcome = poller.wait_for_completion("main", None).await.unwrap();
    assert!(outcome.passed());
}

#[tokio::test]
async fn test_timeout_returns_fully_null_outcome() {
    let provider = ScriptedRuns::new(vec![vec![]]);
    let config = PollConfig {
        poll_interval_ms: 1,
        timeout_ms: 20,
    };
    let poller = RunPoller::new(&provider, config, "experiment.yml");

    let outcome = poller.wait_for_completion("main", None).await.unwrap();

    // Timeout is a normal return value, not an error, and carries no
    // partial run data.
    assert_eq!(outcome, PollOutcome::TimedOut);
    assert!(!outcome.is_terminal());
    assert_eq!(outcome.conclusion(), None);
}

#[tokio::test]
async fn test_idempotent_over_terminal_history() {
    // Polling twice against the same already-terminal history yields the
    // same conclusion; the poller never writes.
    let history = || {
        ScriptedRuns::new(vec![vec![run(
            9,
            RunStatus::Completed,
            Some(RunConclusion::Success),
        )]])
    };

    let first = history();
    let poller = RunPoller::new(&first, fast_config(), "experiment.yml");
    let a = poller.wait_for_completion("main", None).await.unwrap();

    let second = history();
    let poller = RunPoller::new(&second, fast_config(), "experiment.yml");
    let b = poller.wait_for_completion("main", None).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(a.conclusion(), Some(RunConclusion::Success));
}

#[tokio::test]
async fn test_cancel_requested_before_first_tick() {
    let provider = ScriptedRuns::new(vec![vec![run(4, RunStatus::InProgress, None)]]);
    let poller = RunPoller::new(&provider, fast_config(), "experiment.yml");
    let cancel = FlagCancel(AtomicBool::new(true));

    let outcome = poller
        .wait_for_completion("main", Some(&cancel))
        .await
        .unwrap();

    assert_eq!(outcome, PollOutcome::Cancelled);
    // The cancel check runs before any remote query.
    assert_eq!(provider.list_calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_completed_with_null_conclusion_is_not_passed() {
    let provider = ScriptedRuns::new(vec![
        vec![run(6, RunStatus::Completed, None)],
        vec![run(6, RunStatus::Completed, None)],
    ]);
    let poller = RunPoller::new(&provider, fast_config(), "experiment.yml");

    let outcome = poller.wait_for_completion("main", None).await.unwrap();

    assert!(outcome.is_terminal());
    assert!(!outcome.passed());
    // Pessimistic classification still triggers the diagnostics step.
    assert_eq!(provider.detail_calls.load(Ordering::Relaxed), 1);
}
