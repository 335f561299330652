//! Generic retry-until-threshold loop.
//!
//! One engine replaces the per-use-case regenerate loops (code validation,
//! static-analysis fixing, novelty refinement, consistency evaluation):
//! produce a candidate, evaluate it, and either accept or regenerate with
//! the evaluator's feedback folded into the next attempt. When the attempt
//! budget runs out the loop accepts the last candidate anyway — the
//! pipeline proceeds with a best effort instead of hard-failing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::error::Result;

/// Evaluator verdict on one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the candidate is acceptable.
    pub ok: bool,

    /// Human-readable reason; fed back to the producer on regeneration.
    pub message: String,
}

impl Verdict {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Produces candidates, optionally informed by the previous failure reason.
#[async_trait]
pub trait CandidateProducer: Send {
    type Candidate: Send;

    /// Produce the next candidate. `feedback` carries the evaluator's
    /// message from the previous rejected attempt, `None` on the first.
    async fn produce(&mut self, feedback: Option<&str>) -> Result<Self::Candidate>;
}

/// Judges candidates.
#[async_trait]
pub trait CandidateEvaluator<C: Send + Sync>: Send {
    /// Evaluate a candidate. Returning `Ok(None)` means the evaluator has
    /// no verdict at all (no validation data); the loop accepts rather
    /// than regenerate forever against a mute judge.
    async fn evaluate(&mut self, candidate: &C) -> Result<Option<Verdict>>;
}

/// Loop bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineConfig {
    /// Maximum number of produce/evaluate rounds (minimum 1).
    pub max_attempts: u32,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Why the loop accepted its final candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptReason {
    /// The evaluator passed the candidate.
    Accepted,

    /// The evaluator produced no verdict; accepted to avoid looping.
    NoVerdict,

    /// Attempt budget exhausted; best available candidate kept.
    BudgetExhausted,
}

/// Final state of a refine loop.
#[derive(Debug)]
pub struct RefineOutcome<C> {
    /// The accepted candidate.
    pub candidate: C,

    /// Produce/evaluate rounds used.
    pub attempts: u32,

    /// Why the loop stopped.
    pub reason: AcceptReason,

    /// The evaluator's last verdict, if it gave one.
    pub last_verdict: Option<Verdict>,
}

impl<C> RefineOutcome<C> {
    /// Whether acceptance was genuine rather than forced.
    pub fn accepted_cleanly(&self) -> bool {
        matches!(self.reason, AcceptReason::Accepted | AcceptReason::NoVerdict)
    }
}

/// Run the produce/evaluate loop until acceptance or budget exhaustion.
///
/// `goal` names the loop in logs (e.g. "code_validation", "novelty").
pub async fn run_refine_loop<P, E>(
    goal: &str,
    config: &RefineConfig,
    producer: &mut P,
    evaluator: &mut E,
) -> Result<RefineOutcome<P::Candidate>>
where
    P: CandidateProducer,
    P::Candidate: Sync,
    E: CandidateEvaluator<P::Candidate>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut feedback: Option<String> = None;

    for attempt in 1..=max_attempts {
        debug!(goal, attempt, "producing candidate");
        let candidate = producer.produce(feedback.as_deref()).await?;

        let verdict = evaluator.evaluate(&candidate).await?;
        match verdict {
            None => {
                debug!(goal, attempt, "evaluator gave no verdict; accepting");
                return Ok(RefineOutcome {
                    candidate,
                    attempts: attempt,
                    reason: AcceptReason::NoVerdict,
                    last_verdict: None,
                });
            }
            Some(v) if v.ok => {
                debug!(goal, attempt, "candidate accepted");
                return Ok(RefineOutcome {
                    candidate,
                    attempts: attempt,
                    reason: AcceptReason::Accepted,
                    last_verdict: Some(v),
                });
            }
            Some(v) => {
                if attempt == max_attempts {
                    warn!(
                        goal,
                        attempt,
                        reason = %v.message,
                        "attempt budget exhausted; proceeding with last candidate"
                    );
                    return Ok(RefineOutcome {
                        candidate,
                        attempts: attempt,
                        reason: AcceptReason::BudgetExhausted,
                        last_verdict: Some(v),
                    });
                }
                debug!(goal, attempt, reason = %v.message, "candidate rejected; regenerating");
                feedback = Some(v.message);
            }
        }
    }

    unreachable!("loop returns within the attempt budget");
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingProducer {
        calls: u32,
        seen_feedback: Vec<Option<String>>,
    }

    impl CountingProducer {
        fn new() -> Self {
            Self {
                calls: 0,
                seen_feedback: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl CandidateProducer for CountingProducer {
        type Candidate = String;

        async fn produce(&mut self, feedback: Option<&str>) -> Result<String> {
            self.calls += 1;
            self.seen_feedback.push(feedback.map(|s| s.to_string()));
            Ok(format!("draft-{}", self.calls))
        }
    }

    struct ScriptedEvaluator {
        verdicts: Vec<Option<Verdict>>,
    }

    #[async_trait]
    impl CandidateEvaluator<String> for ScriptedEvaluator {
        async fn evaluate(&mut self, _candidate: &String) -> Result<Option<Verdict>> {
            Ok(if self.verdicts.is_empty() {
                Some(Verdict::fail("exhausted script"))
            } else {
                self.verdicts.remove(0)
            })
        }
    }

    #[tokio::test]
    async fn test_accepts_on_first_pass() {
        let mut producer = CountingProducer::new();
        let mut evaluator = ScriptedEvaluator {
            verdicts: vec![Some(Verdict::pass("fine"))],
        };

        let outcome = run_refine_loop("t", &RefineConfig::default(), &mut producer, &mut evaluator)
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.reason, AcceptReason::Accepted);
        assert!(outcome.accepted_cleanly());
        assert_eq!(producer.calls, 1);
    }

    #[tokio::test]
    async fn test_feedback_carried_into_next_attempt() {
        let mut producer = CountingProducer::new();
        let mut evaluator = ScriptedEvaluator {
            verdicts: vec![
                Some(Verdict::fail("novelty score 6 below threshold")),
                Some(Verdict::pass("good")),
            ],
        };

        let outcome = run_refine_loop("t", &RefineConfig::default(), &mut producer, &mut evaluator)
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(producer.seen_feedback[0], None);
        assert_eq!(
            producer.seen_feedback[1].as_deref(),
            Some("novelty score 6 below threshold")
        );
    }

    #[tokio::test]
    async fn test_always_failing_evaluator_forces_accept_at_budget() {
        let mut producer = CountingProducer::new();
        let mut evaluator = ScriptedEvaluator {
            verdicts: vec![
                Some(Verdict::fail("no")),
                Some(Verdict::fail("still no")),
                Some(Verdict::fail("never")),
            ],
        };
        let config = RefineConfig { max_attempts: 3 };

        let outcome = run_refine_loop("t", &config, &mut producer, &mut evaluator)
            .await
            .unwrap();

        // Exactly max_attempts generation calls, then a forced accept.
        assert_eq!(producer.calls, 3);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.reason, AcceptReason::BudgetExhausted);
        assert!(!outcome.accepted_cleanly());
        assert_eq!(outcome.last_verdict.unwrap().message, "never");
    }

    #[tokio::test]
    async fn test_no_verdict_accepts_immediately() {
        let mut producer = CountingProducer::new();
        let mut evaluator = ScriptedEvaluator {
            verdicts: vec![None],
        };

        let outcome = run_refine_loop("t", &RefineConfig::default(), &mut producer, &mut evaluator)
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.reason, AcceptReason::NoVerdict);
        assert!(outcome.last_verdict.is_none());
        assert_eq!(producer.calls, 1);
    }

    #[tokio::test]
    async fn test_zero_max_attempts_clamped_to_one() {
        let mut producer = CountingProducer::new();
        let mut evaluator = ScriptedEvaluator {
            verdicts: vec![Some(Verdict::fail("no"))],
        };
        let config = RefineConfig { max_attempts: 0 };

        let outcome = run_refine_loop("t", &config, &mut producer, &mut evaluator)
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.reason, AcceptReason::BudgetExhausted);
    }
}
