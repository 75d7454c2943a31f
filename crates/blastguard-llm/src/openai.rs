//! OpenAI-compatible chat-completions transport.
//!
//! Works against api.openai.com and any server speaking the same
//! `/v1/chat/completions` dialect. Requests are sent with `temperature = 0`
//! and a JSON response format so the reply is a single object.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::{InferenceClient, InferencePrompt};
use crate::error::InferenceError;
use crate::Result;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const AUTH_ENV_VAR: &str = "OPENAI_API_KEY";

const MAX_ERROR_BODY: usize = 320;

/// Read the API key through `lookup` (normally `std::env::var`).
pub fn api_key_from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    lookup(AUTH_ENV_VAR)
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| InferenceError::MissingCredential(AUTH_ENV_VAR.to_string()))
}

/// Connection settings for [`OpenAiClient`].
#[derive(Clone)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl OpenAiConfig {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: model.into(),
            api_key: api_key.into(),
            timeout_secs: 60,
            temperature: 0.0,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

/// HTTP client for an OpenAI-compatible endpoint.
pub struct OpenAiClient {
    config: OpenAiConfig,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(InferenceError::MissingCredential(AUTH_ENV_VAR.to_string()));
        }
        if config.timeout_secs == 0 {
            return Err(InferenceError::InvalidConfig(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("blastguard/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InferenceError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn classify(&self, err: reqwest::Error) -> InferenceError {
        if err.is_timeout() {
            InferenceError::Timeout {
                secs: self.config.timeout_secs,
            }
        } else {
            InferenceError::from(err)
        }
    }
}

#[async_trait]
impl InferenceClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &InferencePrompt) -> Result<String> {
        let body = build_body(&self.config.model, self.config.temperature, prompt);
        debug!(subject = %prompt.subject, model = %self.config.model, "sending inference request");

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status {
                code: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| self.classify(e))?;
        extract_content(parsed)
    }
}

fn build_body(model: &str, temperature: f32, prompt: &InferencePrompt) -> Value {
    json!({
        "model": model,
        "temperature": temperature,
        "response_format": { "type": "json_object" },
        "messages": [
            { "role": "system", "content": prompt.system },
            { "role": "user", "content": prompt.user },
        ],
    })
}

fn extract_content(response: ChatResponse) -> Result<String> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(InferenceError::EmptyResponse)?;

    let text = match content {
        Value::String(text) => text,
        // Some compatible servers return content parts instead of a string.
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        other => other.to_string(),
    };

    if text.trim().is_empty() {
        return Err(InferenceError::EmptyResponse);
    }
    Ok(text)
}

fn truncate(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let mut out: String = input.chars().take(max_chars).collect();
    out.push('…');
    out
}
