//! Changed files and the context a run executes in.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default base branch for pull-request diffs.
pub const DEFAULT_BASE_REF: &str = "main";

/// A repository-relative path that changed in this run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// File name without directories and without its final extension
    /// (`src/lib/utils.ts` -> `utils`).
    pub fn base_name(&self) -> &str {
        Path::new(&self.path)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.path)
    }

    /// Final extension without the dot, if any.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.path).extension().and_then(|ext| ext.to_str())
    }
}

impl std::fmt::Display for ChangedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// Where the gate is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Pre-commit hook over staged changes.
    Local,
    /// Pre-merge check over a pull-request diff.
    ContinuousIntegration,
}

/// Execution context, fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub mode: RunMode,
    pub base_ref: Option<String>,
}

impl RunContext {
    pub fn local() -> Self {
        Self {
            mode: RunMode::Local,
            base_ref: None,
        }
    }

    pub fn ci(base_ref: Option<String>) -> Self {
        Self {
            mode: RunMode::ContinuousIntegration,
            base_ref,
        }
    }

    pub fn is_ci(&self) -> bool {
        self.mode == RunMode::ContinuousIntegration
    }

    /// Base branch to diff against, falling back to `main`.
    pub fn base_ref_or_default(&self) -> &str {
        self.base_ref
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_REF)
    }
}
