//! Session-level streaming events.
//!
//! The loop emits these as it goes so the presentation layer can render
//! each step the moment it exists instead of waiting for the whole session.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use stepwise_core::step::ReasoningStep;

use crate::session::Termination;

/// Events emitted by the reasoning loop.
///
/// - `started`            : session created, first request about to go out
/// - `step`               : a reasoning step was decoded and logged
/// - `verification`       : the verification step completed
/// - `step_failed`        : a later step failed; the loop stops
/// - `final_answer`       : the final answer arrived
/// - `finalization_failed`: the final answer request failed
/// - `done`               : the session is complete
/// - `error`              : the first step failed; there is no session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        session_id: String,
        model: String,
        max_steps: u32,
    },

    /// `index` is 1-based.
    Step { index: u32, step: ReasoningStep },

    Verification { step: ReasoningStep },

    StepFailed { index: u32, message: String },

    FinalAnswer { content: String, duration: Duration },

    FinalizationFailed { message: String },

    Done {
        session_id: String,
        steps: usize,
        termination: Termination,
        total_duration: Duration,
    },

    Error { message: String },
}

impl SessionEvent {
    /// Event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Step { .. } => "step",
            Self::Verification { .. } => "verification",
            Self::StepFailed { .. } => "step_failed",
            Self::FinalAnswer { .. } => "final_answer",
            Self::FinalizationFailed { .. } => "finalization_failed",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}
