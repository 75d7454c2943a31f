//! BlastGuard LLM: the inference-service boundary.
//!
//! The gate never talks to a model provider directly. It hands an
//! [`InferencePrompt`] to an [`InferenceClient`] and gets raw text back;
//! turning that text into a verdict is the caller's job.
//!
//! ## Key Components
//!
//! - `InferenceClient`: async trait implemented by every transport
//! - `OpenAiClient`: OpenAI-compatible chat-completions transport over `reqwest`
//! - `fakes`: scripted in-memory clients for tests

mod client;
mod error;
pub mod fakes;
mod openai;

pub use client::{InferenceClient, InferencePrompt};
pub use error::InferenceError;
pub use openai::{api_key_from_env, OpenAiClient, OpenAiConfig, AUTH_ENV_VAR, DEFAULT_ENDPOINT};

/// Result type for inference operations
pub type Result<T> = std::result::Result<T, InferenceError>;
