//! The reasoning loop: step after step until the model is ready to answer.
//!
//! The loop is an explicit two-state machine:
//!
//! - **Running { step_count }**: ask the Step Generator for another step.
//! - **Done(termination)**: stop; verification and finalization follow.
//!
//! A failure on the very first step aborts the session. Any later failure
//! keeps the steps produced so far and still asks for a final answer.

use std::sync::Arc;

use stepwise_core::error::{Error, StepError};
use stepwise_core::message::{Role, SessionId};
use stepwise_core::provider::Provider;
use stepwise_core::step::NextAction;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ReasoningConfig;
use crate::finalize::FinalAnswerRequest;
use crate::session::{ReasoningSession, Termination};
use crate::step::StepGenerator;
use crate::stream_event::SessionEvent;

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running { step_count: u32 },
    Done(Termination),
}

impl LoopState {
    pub fn initial() -> Self {
        Self::Running { step_count: 0 }
    }

    /// Transition after a step succeeded. `step_count` includes that step.
    pub fn after_step(step_count: u32, next_action: NextAction, max_steps: u32) -> Self {
        match next_action {
            NextAction::FinalAnswer => Self::Done(Termination::FinalAnswer),
            NextAction::Continue if step_count >= max_steps => {
                Self::Done(Termination::CeilingReached)
            }
            NextAction::Continue => Self::Running { step_count },
        }
    }
}

/// Drives one query from seed log to final answer.
pub struct ReasoningLoop {
    config: Arc<ReasoningConfig>,
    generator: StepGenerator,
    finalizer: FinalAnswerRequest,
}

impl ReasoningLoop {
    pub fn new(provider: Arc<dyn Provider>, config: ReasoningConfig) -> Self {
        let config = Arc::new(config);
        Self {
            generator: StepGenerator::new(provider.clone(), config.clone()),
            finalizer: FinalAnswerRequest::new(provider, config.clone()),
            config,
        }
    }

    /// Reason about `query` and return the finished session.
    pub async fn run(&self, query: &str) -> Result<ReasoningSession, Error> {
        self.execute(query, None).await
    }

    /// Same as [`run`](Self::run), emitting a [`SessionEvent`] as each part
    /// of the session completes. A dropped receiver does not stop the loop.
    pub async fn run_with_events(
        &self,
        query: &str,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<ReasoningSession, Error> {
        self.execute(query, Some(events)).await
    }

    async fn execute(
        &self,
        query: &str,
        events: Option<mpsc::Sender<SessionEvent>>,
    ) -> Result<ReasoningSession, Error> {
        let emit = |event: SessionEvent| {
            let events = events.clone();
            async move {
                if let Some(tx) = events {
                    let _ = tx.send(event).await;
                }
            }
        };

        let id = SessionId::new();
        let mut session = ReasoningSession::new(id.clone(), query, self.config.seed_log(query));
        let max_steps = self.config.max_steps;

        info!(session_id = %id, model = %self.config.model, max_steps, "Starting reasoning session");
        emit(SessionEvent::Started {
            session_id: id.to_string(),
            model: self.config.model.clone(),
            max_steps,
        })
        .await;

        let mut context_warned = false;
        let mut state = LoopState::initial();

        let termination = loop {
            let step_count = match state {
                LoopState::Running { step_count } => step_count,
                LoopState::Done(termination) => break termination,
            };
            let index = step_count + 1;

            match self.generator.generate_step(&mut session.log).await {
                Ok(step) => {
                    debug!(index, title = %step.title, "Step complete");
                    state = LoopState::after_step(index, step.next_action, max_steps);
                    session.steps.push(step.clone());
                    emit(SessionEvent::Step { index, step }).await;
                }
                Err(e) if step_count == 0 => {
                    warn!(session_id = %id, error = %e, "First reasoning step failed, aborting session");
                    emit(SessionEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                    return Err(Error::Step(e));
                }
                Err(e) => {
                    warn!(session_id = %id, index, error = %e, "Reasoning step failed, finalizing with partial steps");
                    emit(SessionEvent::StepFailed {
                        index,
                        message: e.to_string(),
                    })
                    .await;
                    session.step_failure = Some(e);
                    state = LoopState::Done(Termination::StepFailed);
                }
            }

            if !context_warned && self.exceeds_context_window(&session) {
                warn!(
                    estimated_tokens = session.log.estimated_tokens(),
                    context_window = self.config.context_window,
                    "Message log exceeds the model context window"
                );
                context_warned = true;
            }
        };

        session.termination = termination;
        info!(
            session_id = %id,
            steps = session.steps.len(),
            termination = ?termination,
            "Reasoning finished"
        );

        if termination != Termination::StepFailed {
            if let Some(prompt) = &self.config.verification_prompt {
                match self.verify(&mut session, prompt).await {
                    Ok(()) => {
                        if let Some(step) = session.verification.clone() {
                            emit(SessionEvent::Verification { step }).await;
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %id, error = %e, "Verification step failed");
                        session.step_failure = Some(e);
                    }
                }
            }
        }

        match self.finalizer.finalize(&mut session.log).await {
            Ok(answer) => {
                emit(SessionEvent::FinalAnswer {
                    content: answer.content.clone(),
                    duration: answer.duration,
                })
                .await;
                session.final_answer = Some(answer);
            }
            Err(e) => {
                warn!(session_id = %id, error = %e, "Final answer unavailable");
                emit(SessionEvent::FinalizationFailed {
                    message: e.to_string(),
                })
                .await;
                session.finalization_error = Some(e);
            }
        }

        emit(SessionEvent::Done {
            session_id: id.to_string(),
            steps: session.steps.len(),
            termination,
            total_duration: session.total_duration(),
        })
        .await;

        Ok(session)
    }

    async fn verify(&self, session: &mut ReasoningSession, prompt: &str) -> Result<(), StepError> {
        session.log.append(Role::User, prompt);
        let step = self.generator.generate_step(&mut session.log).await?;
        session.verification = Some(step);
        Ok(())
    }

    fn exceeds_context_window(&self, session: &ReasoningSession) -> bool {
        session.log.estimated_tokens() > self.config.context_window as usize
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_helpers::*;
    use stepwise_core::error::{FinalizationError, ProviderError};

    fn strawberry_config(max_steps: u32) -> ReasoningConfig {
        ReasoningConfig::default().with_max_steps(max_steps)
    }

    const QUERY: &str = "How many r's are in 'Strawberry'?";

    #[test]
    fn state_transitions() {
        assert_eq!(
            LoopState::after_step(1, NextAction::Continue, 3),
            LoopState::Running { step_count: 1 }
        );
        assert_eq!(
            LoopState::after_step(3, NextAction::Continue, 3),
            LoopState::Done(Termination::CeilingReached)
        );
        assert_eq!(
            LoopState::after_step(2, NextAction::FinalAnswer, 3),
            LoopState::Done(Termination::FinalAnswer)
        );
        // final_answer on the last allowed step is a natural end, not the ceiling
        assert_eq!(
            LoopState::after_step(3, NextAction::FinalAnswer, 3),
            LoopState::Done(Termination::FinalAnswer)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn strawberry_session() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ok_after(10, step_json("Spell the word", "continue")),
            ok_after(20, step_json("Count the r's", "continue")),
            ok_after(30, step_json("Double-check", "final_answer")),
            ok_after(15, "There are 3 r's in 'Strawberry'."),
        ]));
        let agent = ReasoningLoop::new(provider.clone(), strawberry_config(3));

        let session = agent.run(QUERY).await.unwrap();

        assert_eq!(session.steps.len(), 3);
        assert_eq!(session.termination, Termination::FinalAnswer);
        assert!(session.terminated_naturally());
        assert_eq!(provider.call_count(), 4);
        assert_eq!(session.steps[2].title, "Double-check");
        assert_eq!(
            session.final_answer.as_ref().map(|a| a.content.as_str()),
            Some("There are 3 r's in 'Strawberry'.")
        );
        assert_eq!(session.total_duration(), Duration::from_millis(75));
        let step_sum: Duration = session.steps.iter().map(|s| s.step_duration).sum();
        assert_eq!(step_sum, Duration::from_millis(60));
    }

    #[tokio::test(start_paused = true)]
    async fn ceiling_stops_a_model_that_never_finishes() {
        let mut replies: Vec<Scripted> = (0..3)
            .map(|i| ok_after(5, step_json(&format!("Step {i}"), "continue")))
            .collect();
        replies.push(ok_after(5, "3"));
        let provider = Arc::new(ScriptedProvider::new(replies));
        let agent = ReasoningLoop::new(provider.clone(), strawberry_config(3));

        let session = agent.run(QUERY).await.unwrap();

        assert_eq!(session.steps.len(), 3);
        assert_eq!(session.termination, Termination::CeilingReached);
        assert!(!session.terminated_naturally());
        assert!(session.has_final_answer());
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_on_first_step_aborts() {
        let provider = Arc::new(ScriptedProvider::new(vec![err_after(
            1,
            ProviderError::Network("connection refused".into()),
        )]));
        let agent = ReasoningLoop::new(provider.clone(), strawberry_config(3));

        let err = agent.run(QUERY).await.unwrap_err();

        assert!(matches!(err, Error::Step(StepError::Transport(_))));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_error_on_first_step_aborts() {
        let provider = Arc::new(ScriptedProvider::new(vec![err_after(
            1,
            ProviderError::ApiError {
                status_code: 500,
                message: "internal".into(),
            },
        )]));
        let agent = ReasoningLoop::new(provider.clone(), strawberry_config(3));
        let (tx, mut rx) = mpsc::channel(8);

        let err = agent.run_with_events(QUERY, tx).await.unwrap_err();

        assert!(matches!(err, Error::Step(StepError::Upstream(_))));
        // Only the step request went out; no final answer was asked for.
        assert_eq!(provider.call_count(), 1);
        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(event.event_type());
        }
        assert_eq!(kinds, vec!["started", "error"]);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_first_step_aborts() {
        let provider = Arc::new(ScriptedProvider::new(vec![ok_after(
            1,
            r#"{"title": "Count", "content": "three r's"}"#,
        )]));
        let agent = ReasoningLoop::new(provider.clone(), strawberry_config(3));

        let err = agent.run(QUERY).await.unwrap_err();

        match err {
            Error::Step(StepError::Malformed(inner)) => {
                assert!(inner.reason.contains("next_action"), "reason: {}", inner.reason);
            }
            other => panic!("Expected malformed step, got {other:?}"),
        }
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn later_failure_keeps_steps_and_finalizes() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ok_after(10, step_json("Spell the word", "continue")),
            err_after(
                5,
                ProviderError::ApiError {
                    status_code: 502,
                    message: "bad gateway".into(),
                },
            ),
            ok_after(10, "3"),
        ]));
        let agent = ReasoningLoop::new(provider.clone(), strawberry_config(3));

        let session = agent.run(QUERY).await.unwrap();

        assert_eq!(session.steps.len(), 1);
        assert_eq!(session.termination, Termination::StepFailed);
        assert!(matches!(session.step_failure, Some(StepError::Upstream(_))));
        assert_eq!(provider.call_count(), 3);
        assert!(session.has_final_answer());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_later_step_is_not_logged() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ok_after(10, step_json("Spell the word", "continue")),
            ok_after(10, r#"{"title": "Count", "content": "three"}"#),
            ok_after(10, "3"),
        ]));
        let agent = ReasoningLoop::new(provider.clone(), strawberry_config(5));

        let session = agent.run(QUERY).await.unwrap();

        assert!(matches!(session.step_failure, Some(StepError::Malformed(_))));
        // seed (3) + one step + final instruction + answer
        assert_eq!(session.log.len(), 6);
        assert!(session.log.iter().all(|m| !m.content().contains("\"three\"")));
    }

    #[tokio::test(start_paused = true)]
    async fn finalization_failure_keeps_steps() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ok_after(10, step_json("Spell the word", "continue")),
            ok_after(10, step_json("Count", "final_answer")),
            err_after(10, ProviderError::Timeout("120s".into())),
        ]));
        let agent = ReasoningLoop::new(provider, strawberry_config(5));

        let session = agent.run(QUERY).await.unwrap();

        assert_eq!(session.steps.len(), 2);
        assert!(session.final_answer.is_none());
        assert!(matches!(
            session.finalization_error,
            Some(FinalizationError::Request(StepError::Transport(_)))
        ));
        assert_eq!(session.total_duration(), Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn verification_is_kept_apart_from_steps() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ok_after(10, step_json("Count", "final_answer")),
            ok_after(7, step_json("Recount", "final_answer")),
            ok_after(3, "3"),
        ]));
        let config = strawberry_config(3).with_verification(Some("Verify your answer.".into()));
        let agent = ReasoningLoop::new(provider.clone(), config);

        let session = agent.run(QUERY).await.unwrap();

        assert_eq!(session.steps.len(), 1);
        assert_eq!(
            session.verification.as_ref().map(|s| s.title.as_str()),
            Some("Recount")
        );
        assert_eq!(session.total_duration(), Duration::from_millis(20));
        let second = &provider.requests()[1];
        assert_eq!(
            second.messages.last().map(|m| m.content()),
            Some("Verify your answer.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn log_only_grows() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ok_after(1, step_json("a", "continue")),
            ok_after(1, step_json("b", "continue")),
            ok_after(1, step_json("c", "final_answer")),
            ok_after(1, "3"),
        ]));
        let agent = ReasoningLoop::new(provider.clone(), strawberry_config(5));

        agent.run(QUERY).await.unwrap();

        let lengths: Vec<usize> = provider.requests().iter().map(|r| r.messages.len()).collect();
        assert_eq!(lengths, vec![3, 4, 5, 7]);
        assert!(lengths.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn events_arrive_in_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ok_after(10, step_json("Spell", "continue")),
            ok_after(10, step_json("Count", "final_answer")),
            ok_after(10, "3"),
        ]));
        let agent = ReasoningLoop::new(provider, strawberry_config(3));
        let (tx, mut rx) = mpsc::channel(16);

        agent.run_with_events(QUERY, tx).await.unwrap();

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(event.event_type());
        }
        assert_eq!(kinds, vec!["started", "step", "step", "final_answer", "done"]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_receiver_does_not_stop_the_loop() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ok_after(1, step_json("Count", "final_answer")),
            ok_after(1, "3"),
        ]));
        let agent = ReasoningLoop::new(provider, strawberry_config(3));
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let session = agent.run_with_events(QUERY, tx).await.unwrap();
        assert!(session.has_final_answer());
    }
}
