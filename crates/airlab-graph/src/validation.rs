//! Code-validation instantiation of the refine loop.
//!
//! A produced script carries the result of running its checks; the
//! evaluator turns that into a verdict, feeding the check messages back
//! into the next generation attempt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use airlab_core::{
    run_refine_loop, CandidateEvaluator, CandidateProducer, RefineConfig, RefineOutcome, Result,
    Verdict,
};

/// Result of running validation checks against one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    /// Check failure messages; empty when `ok`.
    pub messages: Vec<String>,
}

impl ValidationResult {
    pub fn pass() -> Self {
        Self {
            ok: true,
            messages: Vec::new(),
        }
    }

    pub fn fail(messages: Vec<String>) -> Self {
        Self {
            ok: false,
            messages,
        }
    }
}

/// A candidate script plus the outcome of its validation checks.
///
/// `checks: None` means validation never ran (no validation data); the
/// refine loop then accepts rather than regenerate against silence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckedScript {
    pub source: String,
    pub checks: Option<ValidationResult>,
}

/// Maps a candidate's own check results onto a refine verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationEvaluator;

#[async_trait]
impl CandidateEvaluator<CheckedScript> for ValidationEvaluator {
    async fn evaluate(&mut self, candidate: &CheckedScript) -> Result<Option<Verdict>> {
        match &candidate.checks {
            None => Ok(None),
            Some(result) if result.ok => Ok(Some(Verdict::pass("all checks passed"))),
            Some(result) => Ok(Some(Verdict::fail(result.messages.join("; ")))),
        }
    }
}

/// Regenerate a script until its checks pass or the attempt budget runs out.
pub async fn refine_checked_script<P>(
    goal: &str,
    producer: &mut P,
    config: RefineConfig,
) -> Result<RefineOutcome<CheckedScript>>
where
    P: CandidateProducer<Candidate = CheckedScript>,
{
    let mut evaluator = ValidationEvaluator;
    run_refine_loop(goal, &config, producer, &mut evaluator).await
}
