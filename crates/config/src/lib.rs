//! Configuration loading, validation, and management for Stepwise.
//!
//! Loads configuration from `~/.stepwise/config.toml` (optional), then a
//! `.env` file in the working directory, then environment variable
//! overrides. Everything is read once at startup and validated.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.stepwise/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bearer credential for the completion endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider label, shown in the banner and logs
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Context window of the model, in tokens
    #[serde(default = "default_context_window")]
    pub context_window: u32,

    /// Sampling temperature for every request
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per reasoning step
    #[serde(default = "default_step_max_tokens")]
    pub step_max_tokens: u32,

    /// Max tokens for the final answer
    #[serde(default = "default_final_max_tokens")]
    pub final_max_tokens: u32,

    /// Ceiling on reasoning steps per query
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Structured output constraint requested for reasoning steps
    #[serde(default)]
    pub response_format: ResponseFormatKind,

    /// Prompt text
    #[serde(default)]
    pub prompts: PromptConfig,
}

fn default_provider() -> String {
    "groq".into()
}
fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_model() -> String {
    "llama-3.1-70b-versatile".into()
}
fn default_context_window() -> u32 {
    8000
}
fn default_temperature() -> f32 {
    0.2
}
fn default_step_max_tokens() -> u32 {
    300
}
fn default_final_max_tokens() -> u32 {
    300
}
fn default_max_steps() -> u32 {
    25
}
fn default_request_timeout_secs() -> u64 {
    120
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("context_window", &self.context_window)
            .field("temperature", &self.temperature)
            .field("step_max_tokens", &self.step_max_tokens)
            .field("final_max_tokens", &self.final_max_tokens)
            .field("max_steps", &self.max_steps)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("response_format", &self.response_format)
            .field("prompts", &self.prompts)
            .finish()
    }
}

/// Which structured-output constraint to request for reasoning steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormatKind {
    /// `{"type": "json_object"}`, supported by Groq and most compatible APIs
    #[default]
    JsonObject,
    /// `{"type": "json_schema", ...}` with the step schema attached
    JsonSchema,
}

/// Prompt text sent to the model. Content, not logic: every entry can be
/// replaced from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// System instruction: step format plus reasoning tips
    #[serde(default = "default_system_prompt")]
    pub system: String,

    /// Assistant message seeded after the user query
    #[serde(default = "default_acknowledgement")]
    pub acknowledgement: String,

    /// Optional extra verification round before the final answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<String>,

    /// Instruction for the final answer request
    #[serde(default = "default_final_answer_prompt")]
    pub final_answer: String,
}

/// Default system instruction: the step format plus reasoning tips.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert AI assistant that explains your reasoning step by step.
For each step, provide a title that describes what you're doing in that step, along with the content.
Decide if you need another step or if you're ready to give the final answer.
Respond in JSON format with 'title', 'content', and 'next_action' (either 'continue' or 'final_answer') keys.
USE AS MANY REASONING STEPS AS NECESSARY TO ENSURE ACCURACY.
ALWAYS DOUBLE-CHECK YOUR RESULTS AND CONSIDER EDGE CASES.
IF YOU FIND A DISCREPANCY IN YOUR REASONING, EXPLAIN IT AND CORRECT IT.
BE AWARE OF YOUR LIMITATIONS AS AN LLM AND WHAT YOU CAN AND CANNOT DO.
IN YOUR REASONING, INCLUDE EXPLORATION OF ALTERNATIVE ANSWERS.
CONSIDER YOU MAY BE WRONG, AND IF YOU ARE WRONG IN YOUR REASONING, WHERE IT WOULD BE.
FULLY TEST ALL OTHER POSSIBILITIES. YOU CAN BE WRONG.
WHEN YOU SAY YOU ARE RE-EXAMINING, ACTUALLY RE-EXAMINE, AND USE ANOTHER APPROACH TO DO SO.
DO NOT JUST SAY YOU ARE RE-EXAMINING. USE AT LEAST 3 METHODS TO DERIVE THE ANSWER. USE BEST PRACTICES.
IF YOU ARE UNSURE OF SOMETHING, SAY SO. DO NOT MAKE UP FACTS.
Example of a valid JSON response:
```json
{
    "title": "Identifying Key Information",
    "content": "To begin solving this problem, we need to carefully examine the given information and identify the crucial elements that will guide our solution process. This involves...",
    "next_action": "continue"
}
```"#;

pub const DEFAULT_ACKNOWLEDGEMENT: &str = "Thank you! I will now think step by step following my instructions, starting at the beginning after decomposing the problem.";

pub const DEFAULT_VERIFICATION_PROMPT: &str = "Before giving the final answer, please verify your result using a different method and explain any discrepancies.";

pub const DEFAULT_FINAL_ANSWER_PROMPT: &str =
    "Please provide the final answer based on your reasoning above.";

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}
fn default_acknowledgement() -> String {
    DEFAULT_ACKNOWLEDGEMENT.into()
}
fn default_final_answer_prompt() -> String {
    DEFAULT_FINAL_ANSWER_PROMPT.into()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system: default_system_prompt(),
            acknowledgement: default_acknowledgement(),
            verification: None,
            final_answer: default_final_answer_prompt(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.stepwise/config.toml),
    /// a `.env` file, and the process environment.
    ///
    /// Environment variables (highest priority):
    /// - `API_KEY`, then `STEPWISE_API_KEY`, `GROQ_API_KEY`, `OPENAI_API_KEY`
    /// - `PROVIDER`, `BASE_URL`, `MODEL_ID`, `CONTEXT_WINDOW`, `MAX_STEPS`
    /// - `VERIFY` (`true`/`false`) toggles the verification round
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Ignoring unreadable .env file: {e}"),
        }

        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Empty values are treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(key) = ["API_KEY", "STEPWISE_API_KEY", "GROQ_API_KEY", "OPENAI_API_KEY"]
            .into_iter()
            .find_map(&get)
        {
            self.api_key = Some(key);
        }

        if let Some(provider) = get("PROVIDER") {
            self.provider = provider;
        }

        if let Some(base_url) = get("BASE_URL") {
            self.base_url = base_url;
        }

        if let Some(model) = get("MODEL_ID") {
            self.model = model;
        }

        if let Some(raw) = get("CONTEXT_WINDOW") {
            self.context_window = parse_env("CONTEXT_WINDOW", &raw)?;
        }

        if let Some(raw) = get("MAX_STEPS") {
            self.max_steps = parse_env("MAX_STEPS", &raw)?;
        }

        if let Some(raw) = get("VERIFY") {
            if parse_bool_env("VERIFY", &raw)? {
                self.prompts
                    .verification
                    .get_or_insert_with(|| DEFAULT_VERIFICATION_PROMPT.to_string());
            } else {
                self.prompts.verification = None;
            }
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".stepwise")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "max_steps must be at least 1".into(),
            ));
        }

        if self.context_window == 0 {
            return Err(ConfigError::ValidationError(
                "context_window must be > 0".into(),
            ));
        }

        if self.step_max_tokens == 0 || self.final_max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "step_max_tokens and final_max_tokens must be > 0".into(),
            ));
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }

        if self.prompts.system.trim().is_empty() || self.prompts.final_answer.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "prompts.system and prompts.final_answer must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// The API key, or an error explaining how to set one.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            context_window: default_context_window(),
            temperature: default_temperature(),
            step_max_tokens: default_step_max_tokens(),
            final_max_tokens: default_final_max_tokens(),
            max_steps: default_max_steps(),
            request_timeout_secs: default_request_timeout_secs(),
            response_format: ResponseFormatKind::default(),
            prompts: PromptConfig::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse::<T>().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

fn parse_bool_env(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidEnv { key: String, value: String },

    #[error("No API key configured (set API_KEY in the environment or a .env file)")]
    MissingApiKey,
}
