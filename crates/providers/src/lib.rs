//! Completion provider implementations for Stepwise.
//!
//! All providers implement the `stepwise_core::Provider` trait. Only the
//! OpenAI-compatible wire format is supported; other backends are reached
//! by pointing `base_url` at them.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
