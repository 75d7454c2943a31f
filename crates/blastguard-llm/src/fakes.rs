//! In-memory inference clients (testing only)
//!
//! `ScriptedClient` answers each prompt from a list of rules keyed on the
//! prompt subject, falling back to a default reply. Every call is counted and
//! recorded so tests can assert on how many requests were issued and with
//! what content.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{InferenceClient, InferencePrompt};
use crate::error::InferenceError;
use crate::Result;

/// Deterministic client that replays canned responses.
#[derive(Debug)]
pub struct ScriptedClient {
    rules: Vec<(String, Result<String>)>,
    default_reply: Result<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<InferencePrompt>>,
}

impl ScriptedClient {
    /// Client that answers every prompt with `reply`.
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default_reply: Ok(reply.into()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Client whose every call fails with `err`.
    pub fn failing(err: InferenceError) -> Self {
        Self {
            rules: Vec::new(),
            default_reply: Err(err),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `reply` when the prompt subject contains `subject`.
    /// Rules are checked in insertion order.
    pub fn when(mut self, subject: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push((subject.into(), Ok(reply.into())));
        self
    }

    /// Fail with `err` when the prompt subject contains `subject`.
    pub fn fail_when(mut self, subject: impl Into<String>, err: InferenceError) -> Self {
        self.rules.push((subject.into(), Err(err)));
        self
    }

    /// Number of `complete` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<InferencePrompt> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &InferencePrompt) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }

        self.rules
            .iter()
            .find(|(subject, _)| prompt.subject.contains(subject.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_client_routes_by_subject() {
        let client = ScriptedClient::always("default")
            .when("billing", "billing-reply")
            .fail_when("broken", InferenceError::Timeout { secs: 5 });

        let a = client
            .complete(&InferencePrompt::new("src/billing.ts", "s", "u"))
            .await;
        let b = client
            .complete(&InferencePrompt::new("src/other.ts", "s", "u"))
            .await;
        let c = client
            .complete(&InferencePrompt::new("src/broken.ts", "s", "u"))
            .await;

        assert_eq!(a.unwrap(), "billing-reply");
        assert_eq!(b.unwrap(), "default");
        assert_eq!(c, Err(InferenceError::Timeout { secs: 5 }));
        assert_eq!(client.calls(), 3);
        assert_eq!(client.prompts()[1].subject, "src/other.ts");
    }

    #[tokio::test]
    async fn test_failing_client_counts_calls() {
        let client = ScriptedClient::failing(InferenceError::EmptyResponse);
        assert!(client
            .complete(&InferencePrompt::new("a.ts", "s", "u"))
            .await
            .is_err());
        assert_eq!(client.calls(), 1);
    }
}
