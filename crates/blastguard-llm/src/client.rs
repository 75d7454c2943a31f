//! Transport-neutral request shape and client trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// One self-contained request to the inference service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferencePrompt {
    /// What the prompt is about (the changed file path). Used for logging and
    /// by fakes to route scripted replies; never sent to the provider.
    pub subject: String,
    /// Instruction block.
    pub system: String,
    /// Role-labelled source text and output directive.
    pub user: String,
}

impl InferencePrompt {
    pub fn new(
        subject: impl Into<String>,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Anything that can turn a prompt into raw model output.
///
/// Implementations own their timeout policy. A call that does not return in
/// time must surface as an error, never as partial text.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Model identifier, for logging.
    fn model(&self) -> &str;

    /// Send one prompt and return the raw response text.
    async fn complete(&self, prompt: &InferencePrompt) -> Result<String>;
}
