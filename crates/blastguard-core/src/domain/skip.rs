//! Why a changed file was not reviewed.

use serde::{Deserialize, Serialize};

/// Reason a file left the analysis set without a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Extension is not in the allow-list.
    ExtensionNotAllowed,
    /// Path matched a configured exclusion glob.
    Excluded { pattern: String },
    /// More line breaks than the ceiling, or the file could not be read.
    Oversized { max_lines: usize },
    /// Importer of `changed` left out of its context for the same reason.
    /// The changed file may still be reviewed, with partial context.
    OversizedDependent { changed: String, max_lines: usize },
    /// Nothing in the dependency graph imports it.
    NoDependents,
    /// The dependency graph could not be built, so there was no context.
    GraphUnavailable,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::ExtensionNotAllowed => f.write_str("extension not analysed"),
            SkipReason::Excluded { pattern } => write!(f, "matches exclude pattern `{pattern}`"),
            SkipReason::Oversized { max_lines } => {
                write!(f, "over {max_lines} lines or unreadable")
            }
            SkipReason::OversizedDependent { changed, max_lines } => write!(
                f,
                "dependent of `{changed}` over {max_lines} lines or unreadable, not shown to the reviewer"
            ),
            SkipReason::NoDependents => f.write_str("no dependents found"),
            SkipReason::GraphUnavailable => f.write_str("dependency graph unavailable"),
        }
    }
}

/// A file that was deliberately not analysed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: SkipReason,
}

impl SkippedFile {
    pub fn new(path: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }
}
