//! Domain model for the airlab pipeline.

pub mod error;
pub mod run;
pub mod task;

pub use error::{CoreError, Result};
pub use run::{PollOutcome, RunConclusion, RunStatus, WorkflowRun};
pub use task::{TaskRecord, TaskStatus};
