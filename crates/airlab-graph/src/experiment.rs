//! Experiment execution subgraph.
//!
//! dispatch -> await_run -> collect. A failed dispatch ends the subgraph
//! without ever invoking the poller; a failed workflow conclusion is
//! surfaced as a typed error so the caller can choose between aborting
//! the pipeline and running a fix-and-retry flow; timeout and
//! cancellation end the flow with a report carrying no artifacts.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use airlab_actions::{
    collect_results, ActionsError, ContentsProvider, DispatchInputs, ExperimentArtifacts,
    PollConfig, RunPoller, RunsProvider, WorkflowDispatch,
};
use airlab_core::{CancelSignal, PollOutcome};

use crate::graph::{GraphError, Node, Step, Subgraph};

/// Everything the experiment flow needs from the remote side.
pub trait ExperimentBackend: WorkflowDispatch + RunsProvider + ContentsProvider {}

impl<T: WorkflowDispatch + RunsProvider + ContentsProvider> ExperimentBackend for T {}

/// Static configuration of one experiment flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Branch the workflow runs on and results are committed to.
    pub branch: String,

    /// Workflow file name, e.g. `experiment.yml`.
    pub workflow_file: String,

    /// Repository path holding the run's results, e.g.
    /// `.research/iteration3`.
    pub results_path: String,

    /// Poller timing.
    pub poll: PollConfig,
}

/// Outcome of one experiment flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    /// Whether the remote accepted the dispatch.
    pub dispatched: bool,

    /// Poll result; `None` when the dispatch failed.
    pub outcome: Option<PollOutcome>,

    /// Collected results; `None` unless the run settled successfully.
    pub artifacts: Option<ExperimentArtifacts>,
}

struct ExperimentState {
    inputs: DispatchInputs,
    report: ExperimentReport,
}

struct DispatchNode<B> {
    backend: Arc<B>,
    config: Arc<ExperimentConfig>,
}

#[async_trait]
impl<B: ExperimentBackend + 'static> Node<ExperimentState> for DispatchNode<B> {
    async fn run(&self, state: &mut ExperimentState) -> Result<Step, GraphError> {
        let accepted = self
            .backend
            .dispatch(&self.config.branch, &self.config.workflow_file, &state.inputs)
            .await;
        state.report.dispatched = accepted;

        if accepted {
            Ok(Step::Goto("await_run"))
        } else {
            // Dispatch failed; the poller is never invoked.
            warn!(
                workflow = %self.config.workflow_file,
                "dispatch not accepted; ending experiment flow"
            );
            Ok(Step::End)
        }
    }
}

struct AwaitRunNode<B> {
    backend: Arc<B>,
    config: Arc<ExperimentConfig>,
    cancel: Option<Arc<dyn CancelSignal>>,
}

#[async_trait]
impl<B: ExperimentBackend + 'static> Node<ExperimentState> for AwaitRunNode<B> {
    async fn run(&self, state: &mut ExperimentState) -> Result<Step, GraphError> {
        let poller = RunPoller::new(
            self.backend.as_ref(),
            self.config.poll,
            self.config.workflow_file.clone(),
        );
        let outcome = poller
            .wait_for_completion(&self.config.branch, self.cancel.as_deref())
            .await?;
        state.report.outcome = Some(outcome.clone());

        match outcome {
            PollOutcome::Terminal {
                status, conclusion, ..
            } => {
                if outcome.passed() {
                    Ok(Step::Goto("collect"))
                } else {
                    // Diagnostics were already fetched and logged by the
                    // poller; surface the failure for the caller to act on.
                    Err(GraphError::Actions(ActionsError::WorkflowFailed {
                        workflow: self.config.workflow_file.clone(),
                        status,
                        conclusion,
                    }))
                }
            }
            PollOutcome::TimedOut | PollOutcome::Cancelled => Ok(Step::End),
        }
    }
}

struct CollectNode<B> {
    backend: Arc<B>,
    config: Arc<ExperimentConfig>,
}

#[async_trait]
impl<B: ExperimentBackend + 'static> Node<ExperimentState> for CollectNode<B> {
    async fn run(&self, state: &mut ExperimentState) -> Result<Step, GraphError> {
        let artifacts = collect_results(
            self.backend.as_ref(),
            &self.config.results_path,
            &self.config.branch,
        )
        .await?;
        info!(
            figures = artifacts.figures.len(),
            has_stdout = artifacts.stdout.is_some(),
            has_metrics = artifacts.metrics.is_some(),
            "experiment results collected"
        );
        state.report.artifacts = Some(artifacts);
        Ok(Step::End)
    }
}

/// Run the full experiment flow: dispatch the workflow, wait for the run
/// chain to settle, and collect results on success.
pub async fn run_experiment<B: ExperimentBackend + 'static>(
    backend: Arc<B>,
    config: ExperimentConfig,
    inputs: DispatchInputs,
    cancel: Option<Arc<dyn CancelSignal>>,
) -> Result<ExperimentReport, GraphError> {
    let config = Arc::new(config);

    let graph = Subgraph::new("experiment", "dispatch")
        .with_node(
            "dispatch",
            DispatchNode {
                backend: backend.clone(),
                config: config.clone(),
            },
        )
        .with_node(
            "await_run",
            AwaitRunNode {
                backend: backend.clone(),
                config: config.clone(),
                cancel,
            },
        )
        .with_node(
            "collect",
            CollectNode {
                backend,
                config: config.clone(),
            },
        );

    let mut state = ExperimentState {
        inputs,
        report: ExperimentReport::default(),
    };
    graph.run(&mut state).await?;
    Ok(state.report)
}
