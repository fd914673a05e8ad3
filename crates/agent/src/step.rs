//! Step Generator: one request in, one decoded reasoning step out.

use std::sync::Arc;

use stepwise_core::error::StepError;
use stepwise_core::message::{MessageLog, Role};
use stepwise_core::provider::{Provider, ProviderRequest};
use stepwise_core::step::{ReasoningStep, StepPayload};
use tokio::time::Instant;
use tracing::debug;

use crate::config::ReasoningConfig;

/// Sends the current log to the model and decodes the reply as a step.
#[derive(Clone)]
pub struct StepGenerator {
    provider: Arc<dyn Provider>,
    config: Arc<ReasoningConfig>,
}

impl StepGenerator {
    pub fn new(provider: Arc<dyn Provider>, config: Arc<ReasoningConfig>) -> Self {
        Self { provider, config }
    }

    /// Request the next step.
    ///
    /// On success the step's canonical JSON is appended to `log` as an
    /// assistant message. On any error the log is left untouched.
    pub async fn generate_step(&self, log: &mut MessageLog) -> Result<ReasoningStep, StepError> {
        let request = ProviderRequest {
            model: self.config.model.clone(),
            messages: log.snapshot(),
            temperature: self.config.temperature,
            max_tokens: Some(self.config.step_max_tokens),
            response_format: Some(self.config.response_format.clone()),
        };

        let started = Instant::now();
        let response = self.provider.complete(request).await?;
        let payload = StepPayload::decode(response.message.content())?;
        let elapsed = started.elapsed();

        debug!(
            title = %payload.title,
            next_action = payload.next_action.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Decoded reasoning step"
        );

        log.append(Role::Assistant, payload.to_json());
        Ok(ReasoningStep::from_payload(payload, elapsed))
    }
}
