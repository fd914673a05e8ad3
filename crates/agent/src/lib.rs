//! The reasoning loop at the heart of Stepwise.
//!
//! One query runs through three stages:
//!
//! 1. **Seed** a message log (system instruction, query, acknowledgement)
//! 2. **Step**: ask the model for titled JSON steps until it signals
//!    `final_answer` or the step ceiling is reached
//! 3. **Finalize**: ask for a plain-text answer from the accumulated log
//!
//! Every step and the final answer are timed, and the result is a
//! [`ReasoningSession`] that keeps whatever was produced even when a later
//! request fails.

pub mod config;
pub mod finalize;
pub mod reasoning_loop;
pub mod session;
pub mod step;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use config::ReasoningConfig;
pub use finalize::FinalAnswerRequest;
pub use reasoning_loop::{LoopState, ReasoningLoop};
pub use session::{FinalAnswer, ReasoningSession, Termination};
pub use step::StepGenerator;
pub use stream_event::SessionEvent;
