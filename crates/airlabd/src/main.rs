//! Airlab pipeline daemon.
//!
//! Each invocation of `run` creates a task record, drives the experiment
//! flow to completion, and records the outcome on the task. The task
//! store is in-process; records do not survive the process.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use uuid::Uuid;

use airlab_actions::{ApiClient, DispatchInputs, GithubRepo, PollConfig, RepoRef};
use airlab_core::{
    init_tracing, CancelSignal, MemoryTaskStore, PollOutcome, StoreCancelSignal, TaskStatus,
    TaskStore,
};
use airlab_graph::{run_experiment, ExperimentConfig};

#[derive(Parser)]
#[command(name = "airlabd", version, about = "Airlab research pipeline daemon")]
struct Cli {
    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dispatch an experiment workflow and wait for its results.
    Run {
        /// Repository owner.
        #[arg(long)]
        owner: String,

        /// Repository name.
        #[arg(long)]
        repo: String,

        /// Branch to dispatch on and read results from.
        #[arg(long, default_value = "main")]
        branch: String,

        /// Workflow file name, e.g. experiment.yml.
        #[arg(long)]
        workflow: String,

        /// Repository path holding the run's result files.
        #[arg(long, default_value = ".research/results")]
        results_path: String,

        /// Workflow inputs as key=value pairs (repeatable).
        #[arg(long = "input", value_parser = parse_key_val)]
        inputs: Vec<(String, String)>,

        /// Delay between poll ticks (milliseconds).
        #[arg(long, default_value_t = 30_000)]
        poll_interval_ms: u64,

        /// Wall-clock poll budget (milliseconds).
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("invalid input '{raw}', expected key=value")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs, Level::INFO);

    match cli.command {
        Command::Run {
            owner,
            repo,
            branch,
            workflow,
            results_path,
            inputs,
            poll_interval_ms,
            timeout_ms,
        } => {
            let mut poll = PollConfig {
                poll_interval_ms,
                ..PollConfig::default()
            };
            if let Some(timeout_ms) = timeout_ms {
                poll.timeout_ms = timeout_ms;
            }

            let config = ExperimentConfig {
                branch,
                workflow_file: workflow,
                results_path,
                poll,
            };

            let mut dispatch_inputs = DispatchInputs::new();
            for (key, value) in inputs {
                dispatch_inputs.insert(key, value);
            }

            run_pipeline_task(RepoRef::new(owner, repo), config, dispatch_inputs).await
        }
    }
}

async fn run_pipeline_task(
    repo: RepoRef,
    config: ExperimentConfig,
    inputs: DispatchInputs,
) -> anyhow::Result<()> {
    let store: Arc<dyn TaskStore> = Arc::new(MemoryTaskStore::new());
    let task_id = Uuid::new_v4().to_string();
    store.create(&task_id).await?;
    store.set_status(&task_id, TaskStatus::Running).await?;
    info!(%task_id, repo = %repo.full_name(), "pipeline task started");

    let client = Arc::new(ApiClient::from_env().context("building github client")?);
    let backend = Arc::new(GithubRepo::new(client, repo));
    let cancel: Arc<dyn CancelSignal> = Arc::new(StoreCancelSignal::new(store.clone(), &task_id));

    match run_experiment(backend, config, inputs, Some(cancel)).await {
        Ok(report) => {
            let status = match report.outcome {
                Some(PollOutcome::Cancelled) => TaskStatus::Cancelled,
                _ => TaskStatus::Completed,
            };
            store
                .set_result(&task_id, serde_json::to_value(&report)?)
                .await?;
            store.set_status(&task_id, status).await?;
            info!(
                %task_id,
                ?status,
                dispatched = report.dispatched,
                terminal = report.outcome.as_ref().map(|o| o.is_terminal()).unwrap_or(false),
                "pipeline task finished"
            );
            Ok(())
        }
        Err(e) => {
            // Full chain server-side; the task record only carries the label.
            error!(%task_id, error = ?e, "pipeline task failed");
            store
                .set_error(&task_id, format!("{}: {}", e.kind(), e))
                .await?;
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("model=small").unwrap(),
            ("model".to_string(), "small".to_string())
        );
        assert_eq!(
            parse_key_val("seeds=[1,2]").unwrap(),
            ("seeds".to_string(), "[1,2]".to_string())
        );
        assert!(parse_key_val("no-equals").is_err());
        assert!(parse_key_val("=value").is_err());
    }
}
