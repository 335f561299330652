//! Hypothesis refinement over the generic refine loop.
//!
//! A draft hypothesis is scored along several dimensions (novelty,
//! significance, feasibility, ...); it is accepted only when every
//! tracked dimension clears its threshold. Rejection feedback names the
//! failing dimensions so the next generation attempt can address them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use airlab_core::{
    run_refine_loop, CandidateEvaluator, CandidateProducer, RefineConfig, RefineOutcome, Result,
    Verdict,
};

/// A candidate draft with per-dimension scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDraft {
    pub text: String,
    pub scores: BTreeMap<String, f64>,
}

impl ScoredDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            scores: BTreeMap::new(),
        }
    }

    pub fn with_score(mut self, dimension: impl Into<String>, score: f64) -> Self {
        self.scores.insert(dimension.into(), score);
        self
    }
}

/// Accepts a draft when all tracked dimensions meet their thresholds.
///
/// A draft with no scores at all means the scorer produced no verdict;
/// the refine loop then accepts rather than regenerate forever.
#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    thresholds: BTreeMap<String, f64>,
}

impl ThresholdEvaluator {
    pub fn new(thresholds: BTreeMap<String, f64>) -> Self {
        Self { thresholds }
    }

    pub fn single(dimension: impl Into<String>, min: f64) -> Self {
        let mut thresholds = BTreeMap::new();
        thresholds.insert(dimension.into(), min);
        Self { thresholds }
    }
}

#[async_trait]
impl CandidateEvaluator<ScoredDraft> for ThresholdEvaluator {
    async fn evaluate(&mut self, candidate: &ScoredDraft) -> Result<Option<Verdict>> {
        if candidate.scores.is_empty() {
            return Ok(None);
        }

        let mut failing = Vec::new();
        for (dimension, min) in &self.thresholds {
            match candidate.scores.get(dimension) {
                Some(score) if score >= min => {}
                Some(score) => {
                    failing.push(format!("{dimension} scored {score}, needs {min}"));
                }
                None => {
                    failing.push(format!("{dimension} was not scored, needs {min}"));
                }
            }
        }

        if failing.is_empty() {
            Ok(Some(Verdict::pass("all dimensions meet thresholds")))
        } else {
            Ok(Some(Verdict::fail(failing.join("; "))))
        }
    }
}

/// Refine a scored draft until every dimension clears its threshold or
/// the attempt budget runs out.
pub async fn refine_scored_draft<P>(
    goal: &str,
    producer: &mut P,
    thresholds: BTreeMap<String, f64>,
    config: RefineConfig,
) -> Result<RefineOutcome<ScoredDraft>>
where
    P: CandidateProducer<Candidate = ScoredDraft>,
{
    let mut evaluator = ThresholdEvaluator::new(thresholds);
    run_refine_loop(goal, &config, producer, &mut evaluator).await
}
