//! Final Answer Request: ask for a plain-text answer once reasoning stops.

use std::sync::Arc;

use stepwise_core::error::FinalizationError;
use stepwise_core::message::{MessageLog, Role};
use stepwise_core::provider::{Provider, ProviderRequest};
use tokio::time::Instant;
use tracing::debug;

use crate::config::ReasoningConfig;
use crate::session::FinalAnswer;

#[derive(Clone)]
pub struct FinalAnswerRequest {
    provider: Arc<dyn Provider>,
    config: Arc<ReasoningConfig>,
}

impl FinalAnswerRequest {
    pub fn new(provider: Arc<dyn Provider>, config: Arc<ReasoningConfig>) -> Self {
        Self { provider, config }
    }

    /// Append the final-answer instruction and request the answer.
    ///
    /// The instruction stays in the log even when the request fails; the
    /// answer is appended only when it arrives non-empty.
    pub async fn finalize(&self, log: &mut MessageLog) -> Result<FinalAnswer, FinalizationError> {
        log.append(Role::User, self.config.final_answer_prompt.as_str());

        let request = ProviderRequest {
            model: self.config.model.clone(),
            messages: log.snapshot(),
            temperature: self.config.temperature,
            max_tokens: Some(self.config.final_max_tokens),
            response_format: None,
        };

        let started = Instant::now();
        let response = self.provider.complete(request).await?;
        let duration = started.elapsed();

        let content = response.message.content().trim();
        if content.is_empty() {
            return Err(FinalizationError::EmptyAnswer);
        }

        debug!(
            chars = content.len(),
            elapsed_ms = duration.as_millis() as u64,
            "Received final answer"
        );
        log.append(Role::Assistant, content);

        Ok(FinalAnswer {
            content: content.to_string(),
            duration,
        })
    }
}
