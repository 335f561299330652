//! Airlab Core Library
//!
//! Domain types and orchestration primitives shared by the airlab pipeline
//! crates: run/conclusion model, task lifecycle, the generic
//! retry-until-threshold engine, and tracing setup.

pub mod domain;
pub mod refine;
pub mod task_store;
pub mod telemetry;

pub use domain::{
    CoreError, PollOutcome, Result, RunConclusion, RunStatus, TaskRecord, TaskStatus, WorkflowRun,
};

pub use refine::{
    run_refine_loop, AcceptReason, CandidateEvaluator, CandidateProducer, RefineConfig,
    RefineOutcome, Verdict,
};

pub use task_store::{CancelSignal, MemoryTaskStore, StoreCancelSignal, TaskStore};

pub use telemetry::init_tracing;

/// Airlab version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
