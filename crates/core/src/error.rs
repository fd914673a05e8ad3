//! Error types for the Stepwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Wire-level failures
//! (`ProviderError`) are classified into the step taxonomy
//! (`StepError`) at the boundary between the provider and the loop.

use thiserror::Error;

/// The top-level error type for all Stepwise operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Reasoning errors ---
    #[error("Reasoning step failed: {0}")]
    Step(#[from] StepError),

    #[error(transparent)]
    Finalization(#[from] FinalizationError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a completion endpoint.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Unusable response envelope: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether the endpoint could not be reached or refused the caller
    /// (network, timeout, auth, rate limit).
    ///
    /// Everything else means the endpoint answered but the answer was unusable.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Timeout(_)
                | Self::AuthenticationFailed(_)
                | Self::RateLimited { .. }
                | Self::NotConfigured(_)
        )
    }
}

/// The model answered, but not with a conforming reasoning step.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Malformed reasoning step: {reason}")]
pub struct MalformedStepError {
    /// What was wrong with the payload.
    pub reason: String,

    /// The raw response text, kept for diagnostics.
    pub raw: String,
}

impl MalformedStepError {
    pub fn new(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}

/// Why a single reasoning step could not be produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepError {
    #[error("Transport error: {0}")]
    Transport(ProviderError),

    #[error("Upstream error: {0}")]
    Upstream(ProviderError),

    #[error(transparent)]
    Malformed(#[from] MalformedStepError),
}

impl From<ProviderError> for StepError {
    fn from(err: ProviderError) -> Self {
        if err.is_transport() {
            Self::Transport(err)
        } else {
            Self::Upstream(err)
        }
    }
}

/// The final-answer request failed after the reasoning steps succeeded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FinalizationError {
    #[error("Final answer request failed: {0}")]
    Request(StepError),

    #[error("Final answer request returned an empty answer")]
    EmptyAnswer,
}

impl From<ProviderError> for FinalizationError {
    fn from(err: ProviderError) -> Self {
        Self::Request(StepError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn network_and_auth_failures_are_transport() {
        assert!(ProviderError::Network("connection refused".into()).is_transport());
        assert!(ProviderError::Timeout("120s".into()).is_transport());
        assert!(ProviderError::AuthenticationFailed("bad key".into()).is_transport());
        assert!(ProviderError::RateLimited { retry_after_secs: 5 }.is_transport());
    }

    #[test]
    fn error_statuses_are_upstream() {
        let err = StepError::from(ProviderError::ApiError {
            status_code: 500,
            message: "boom".into(),
        });
        assert!(matches!(err, StepError::Upstream(_)));

        let err = StepError::from(ProviderError::InvalidResponse("no choices".into()));
        assert!(matches!(err, StepError::Upstream(_)));
    }

    #[test]
    fn malformed_step_keeps_raw_response() {
        let err = StepError::from(MalformedStepError::new(
            "missing field `next_action`",
            r#"{"title":"x","content":"y"}"#,
        ));
        assert!(err.to_string().contains("next_action"));
        match err {
            StepError::Malformed(inner) => assert!(inner.raw.contains("title")),
            other => panic!("Expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn finalization_error_wraps_cause() {
        let err = Error::from(FinalizationError::from(ProviderError::Network(
            "reset".into(),
        )));
        assert!(err.to_string().contains("Final answer request failed"));
        assert!(err.to_string().contains("reset"));
    }
}
