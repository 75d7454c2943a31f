//! Error types for blastguard-llm

use thiserror::Error;

/// Errors that can occur while talking to the inference service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    /// Required credential is absent from the environment
    #[error("missing credential: {0} is not set")]
    MissingCredential(String),

    /// Client could not be constructed from its configuration
    #[error("invalid inference client configuration: {0}")]
    InvalidConfig(String),

    /// Connection, TLS or body-decoding failure
    #[error("inference transport error: {0}")]
    Transport(String),

    /// The call did not return within the configured timeout
    #[error("inference call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Endpoint answered with a non-success status
    #[error("inference endpoint returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// Endpoint answered successfully but without any message content
    #[error("inference endpoint returned no content")]
    EmptyResponse,
}

impl InferenceError {
    /// Whether this error must abort the run instead of being recorded per file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            InferenceError::MissingCredential(_) | InferenceError::InvalidConfig(_)
        )
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        InferenceError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(InferenceError::MissingCredential("OPENAI_API_KEY".into()).is_fatal());
        assert!(InferenceError::InvalidConfig("bad".into()).is_fatal());
        assert!(!InferenceError::Timeout { secs: 30 }.is_fatal());
        assert!(!InferenceError::EmptyResponse.is_fatal());
        assert!(!InferenceError::Status {
            code: 500,
            body: "boom".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_error_display_names_cause() {
        let err = InferenceError::Status {
            code: 429,
            body: "rate limited".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("429"));
        assert!(msg.contains("rate limited"));

        let err = InferenceError::MissingCredential("OPENAI_API_KEY".to_string());
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
