//! The result of reasoning about one query.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stepwise_core::error::{FinalizationError, StepError};
use stepwise_core::message::{MessageLog, SessionId};
use stepwise_core::step::ReasoningStep;

/// Why the loop stopped generating steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model signalled `final_answer`.
    FinalAnswer,
    /// The step ceiling was hit while the model still wanted to continue.
    CeilingReached,
    /// A step after the first one failed.
    StepFailed,
}

/// The synthesized answer and how long the request took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub content: String,
    pub duration: Duration,
}

/// Steps, optional verification, and final answer for one query.
///
/// Partial results survive failures: a failed later step leaves the earlier
/// steps in place, and a failed final answer leaves every step in place.
#[derive(Debug, Clone)]
pub struct ReasoningSession {
    pub id: SessionId,
    pub query: String,
    pub started_at: DateTime<Utc>,
    pub steps: Vec<ReasoningStep>,
    pub verification: Option<ReasoningStep>,
    pub final_answer: Option<FinalAnswer>,
    pub termination: Termination,
    /// The step (or verification) error that stopped the loop, if any.
    pub step_failure: Option<StepError>,
    pub finalization_error: Option<FinalizationError>,
    /// The full conversation as it was sent to the model.
    pub log: MessageLog,
}

impl ReasoningSession {
    pub(crate) fn new(id: SessionId, query: impl Into<String>, log: MessageLog) -> Self {
        Self {
            id,
            query: query.into(),
            started_at: Utc::now(),
            steps: Vec::new(),
            verification: None,
            final_answer: None,
            termination: Termination::FinalAnswer,
            step_failure: None,
            finalization_error: None,
            log,
        }
    }

    /// Sum of every step, the verification step, and the final answer.
    pub fn total_duration(&self) -> Duration {
        let steps: Duration = self.steps.iter().map(|s| s.step_duration).sum();
        let verification = self
            .verification
            .as_ref()
            .map(|s| s.step_duration)
            .unwrap_or_default();
        let answer = self
            .final_answer
            .as_ref()
            .map(|a| a.duration)
            .unwrap_or_default();
        steps + verification + answer
    }

    /// Whether the model ended on its own rather than hitting a limit or error.
    pub fn terminated_naturally(&self) -> bool {
        self.termination == Termination::FinalAnswer
    }

    pub fn has_final_answer(&self) -> bool {
        self.final_answer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::step::NextAction;

    fn step(ms: u64, next_action: NextAction) -> ReasoningStep {
        ReasoningStep {
            title: "t".into(),
            content: "c".into(),
            next_action,
            step_duration: Duration::from_millis(ms),
        }
    }

    #[test]
    fn total_duration_sums_every_part() {
        let mut session = ReasoningSession::new(SessionId::new(), "q", MessageLog::new());
        session.steps.push(step(10, NextAction::Continue));
        session.steps.push(step(20, NextAction::FinalAnswer));
        session.verification = Some(step(5, NextAction::FinalAnswer));
        session.final_answer = Some(FinalAnswer {
            content: "3".into(),
            duration: Duration::from_millis(7),
        });

        assert_eq!(session.total_duration(), Duration::from_millis(42));
    }

    #[test]
    fn empty_session_has_zero_duration() {
        let session = ReasoningSession::new(SessionId::new(), "q", MessageLog::new());
        assert_eq!(session.total_duration(), Duration::ZERO);
        assert!(!session.has_final_answer());
    }

    #[test]
    fn termination_serializes_snake_case() {
        let json = serde_json::to_string(&Termination::CeilingReached).unwrap();
        assert_eq!(json, r#""ceiling_reached""#);
    }
}
