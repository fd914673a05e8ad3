//! Reasoning step types and the schema-validated decode path.
//!
//! The model is asked to answer every step with a JSON object:
//!
//! ```json
//! { "title": "...", "content": "...", "next_action": "continue" }
//! ```
//!
//! Decoding parses the JSON, validates it against the schema generated
//! from [`StepPayload`], then deserializes into the typed record. Anything
//! that fails along the way is a [`MalformedStepError`] carrying the raw text.

use std::sync::LazyLock;
use std::time::Duration;

use jsonschema::JSONSchema;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MalformedStepError;

/// Whether the model wants another step or is ready to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    Continue,
    FinalAnswer,
}

impl NextAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::FinalAnswer => "final_answer",
        }
    }
}

/// The structured object the model returns for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StepPayload {
    /// What this step is doing.
    pub title: String,
    /// The reasoning itself.
    pub content: String,
    /// `continue` or `final_answer`.
    pub next_action: NextAction,
}

impl StepPayload {
    /// Decode a raw model response into a step payload.
    pub fn decode(raw: &str) -> Result<Self, MalformedStepError> {
        let body = strip_code_fence(raw.trim());

        let value: Value = serde_json::from_str(body)
            .map_err(|e| MalformedStepError::new(format!("response is not valid JSON: {e}"), raw))?;

        let validator = step_validator()
            .map_err(|message| MalformedStepError::new(format!("step schema unavailable: {message}"), raw))?;

        if let Err(violations) = validator.validate(&value) {
            let errors: Vec<String> = violations.map(|e| e.to_string()).collect();
            return Err(MalformedStepError::new(
                format!("schema violation: {}", errors.join("; ")),
                raw,
            ));
        }

        serde_json::from_value(value).map_err(|e| MalformedStepError::new(e.to_string(), raw))
    }

    /// Serialize back to the compact JSON form stored in the message log.
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "title": self.title,
            "content": self.content,
            "next_action": self.next_action,
        })
        .to_string()
    }
}

/// JSON Schema of [`StepPayload`], sent with `json_schema` response formats.
pub fn step_schema() -> Value {
    serde_json::to_value(schema_for!(StepPayload)).unwrap_or(Value::Null)
}

static STEP_VALIDATOR: LazyLock<Result<JSONSchema, String>> =
    LazyLock::new(|| JSONSchema::compile(&step_schema()).map_err(|err| err.to_string()));

fn step_validator() -> Result<&'static JSONSchema, String> {
    STEP_VALIDATOR.as_ref().map_err(Clone::clone)
}

/// Models sometimes wrap JSON in a Markdown fence even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening line, or before the
    // body when the whole fence sits on one line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// One titled unit of reasoning, with how long it took to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub title: String,
    pub content: String,
    pub next_action: NextAction,
    pub step_duration: Duration,
}

impl ReasoningStep {
    pub fn from_payload(payload: StepPayload, step_duration: Duration) -> Self {
        Self {
            title: payload.title,
            content: payload.content,
            next_action: payload.next_action,
            step_duration,
        }
    }

    pub fn is_final(&self) -> bool {
        self.next_action == NextAction::FinalAnswer
    }
}
