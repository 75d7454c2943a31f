//! Domain-level error taxonomy for BlastGuard.

/// BlastGuard domain errors.
#[derive(Debug, thiserror::Error)]
pub enum BlastGuardError {
    #[error("git error: {0}")]
    GitError(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("dependency graph unavailable: {0}")]
    GraphUnavailable(String),

    #[error("no dependents to review for {0}")]
    EmptyBlastRadius(String),

    #[error("hook installation failed: {0}")]
    HookError(String),

    #[error("config file parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for BlastGuard domain operations.
pub type Result<T> = std::result::Result<T, BlastGuardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blastguard_error_display() {
        let err = BlastGuardError::GitError("not a repository".to_string());
        assert!(err.to_string().contains("git error"));

        let err = BlastGuardError::InvalidConfig("max_files must be a number".to_string());
        assert!(err.to_string().contains("invalid configuration"));

        let err = BlastGuardError::GraphUnavailable("madge exited 1".to_string());
        assert!(err.to_string().contains("madge exited 1"));

        let err = BlastGuardError::EmptyBlastRadius("src/lonely.ts".to_string());
        assert_eq!(err.to_string(), "no dependents to review for src/lonely.ts");
    }

    #[test]
    fn test_invalid_pattern_error() {
        let err = BlastGuardError::InvalidPattern {
            pattern: "src/[".to_string(),
            reason: "unclosed character class".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("src/["));
        assert!(msg.contains("unclosed"));
    }
}
