//! GitHub Actions integration for the airlab pipeline.
//!
//! Provides the retrying API client, the workflow dispatcher, the run
//! poller (chain-aware completion detection with bounded wall-clock
//! timeout), and the repository-contents artifact retriever.

pub mod artifacts;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod poll;

pub use artifacts::{
    collect_results, parse_dir_listing, ContentsProvider, DirEntry, ExperimentArtifacts,
    FileContent,
};
pub use client::{ApiClient, GithubConfig, GithubRepo, RepoRef, RetryPolicy};
pub use dispatch::{DispatchInputs, WorkflowDispatch};
pub use error::{ActionsError, Result};
pub use poll::{PollConfig, PollPhase, RunPoller, RunsProvider};
