//! # Stepwise Core
//!
//! Domain types, traits, and error definitions for the Stepwise
//! reasoning-chain client. This crate has no HTTP or runtime dependencies;
//! it defines the model that the provider, agent, and CLI crates build on.

pub mod error;
pub mod message;
pub mod provider;
pub mod step;

// Re-export key types at crate root for ergonomics
pub use error::{Error, FinalizationError, MalformedStepError, ProviderError, Result, StepError};
pub use message::{Message, MessageLog, Role, SessionId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseFormat, Usage};
pub use step::{NextAction, ReasoningStep, StepPayload, step_schema};
