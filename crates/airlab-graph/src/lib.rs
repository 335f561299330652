//! Subgraph composition for the airlab pipeline.
//!
//! A subgraph is a small state machine of named nodes; each node does one
//! unit of work (an API call, a poll, a collection step) and names its
//! successor. The concrete flows — experiment execution and hypothesis
//! refinement — are built from these nodes over the actions layer.

pub mod experiment;
pub mod graph;
pub mod hypothesis;
pub mod validation;

pub use experiment::{run_experiment, ExperimentBackend, ExperimentConfig, ExperimentReport};
pub use graph::{GraphError, Node, NodeTag, Step, Subgraph};
pub use hypothesis::{refine_scored_draft, ScoredDraft, ThresholdEvaluator};
pub use validation::{refine_checked_script, CheckedScript, ValidationEvaluator, ValidationResult};
