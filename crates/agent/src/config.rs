//! Immutable per-run settings for the reasoning loop.

use stepwise_config::{AppConfig, ResponseFormatKind};
use stepwise_core::message::{MessageLog, Role};
use stepwise_core::provider::ResponseFormat;
use stepwise_core::step::step_schema;

/// Everything the Step Generator, loop, and Final Answer Request need to
/// know, resolved once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Max tokens per reasoning step.
    pub step_max_tokens: u32,
    /// Max tokens for the final answer.
    pub final_max_tokens: u32,
    /// Step ceiling (at least 1).
    pub max_steps: u32,
    /// Model context window, used only to warn when the log outgrows it.
    pub context_window: u32,
    /// Shape constraint requested for reasoning steps.
    pub response_format: ResponseFormat,
    pub system_prompt: String,
    pub acknowledgement: String,
    pub verification_prompt: Option<String>,
    pub final_answer_prompt: String,
}

impl ReasoningConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        let response_format = match config.response_format {
            ResponseFormatKind::JsonObject => ResponseFormat::JsonObject,
            ResponseFormatKind::JsonSchema => ResponseFormat::JsonSchema {
                name: "reasoning_step".into(),
                schema: step_schema(),
            },
        };

        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            step_max_tokens: config.step_max_tokens,
            final_max_tokens: config.final_max_tokens,
            max_steps: config.max_steps.max(1),
            context_window: config.context_window,
            response_format,
            system_prompt: config.prompts.system.clone(),
            acknowledgement: config.prompts.acknowledgement.clone(),
            verification_prompt: config.prompts.verification.clone(),
            final_answer_prompt: config.prompts.final_answer.clone(),
        }
    }

    /// Override the step ceiling (clamped to at least 1).
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Enable or disable the verification round.
    pub fn with_verification(mut self, prompt: Option<String>) -> Self {
        self.verification_prompt = prompt;
        self
    }

    /// Seed a fresh log for one query: system instruction, the query, and
    /// the assistant acknowledgement.
    pub fn seed_log(&self, query: &str) -> MessageLog {
        let mut log = MessageLog::new();
        log.append(Role::System, self.system_prompt.as_str());
        log.append(Role::User, query);
        if !self.acknowledgement.is_empty() {
            log.append(Role::Assistant, self.acknowledgement.as_str());
        }
        log
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}
