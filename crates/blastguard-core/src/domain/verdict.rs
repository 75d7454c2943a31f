//! Per-file verdicts returned by the inference service.

use serde::{Deserialize, Serialize};

/// Whether the change is safe for its dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Approved,
    Rejected,
}

/// Risk tier attached to a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Risk {
    Low,
    Critical,
}

/// A well-formed assessment of one changed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub file: String,
    pub outcome: Outcome,
    pub risk: Risk,
    pub reason: String,
}

impl Verdict {
    /// A verdict blocks when it rejects the change or flags it critical.
    pub fn blocks(&self) -> bool {
        self.outcome == Outcome::Rejected || self.risk == Risk::Critical
    }
}

/// What one changed file ended up with: a verdict, or a recorded gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerdictEntry {
    Assessed(Verdict),
    AnalysisFailed { file: String, cause: String },
}

impl VerdictEntry {
    pub fn file(&self) -> &str {
        match self {
            VerdictEntry::Assessed(v) => &v.file,
            VerdictEntry::AnalysisFailed { file, .. } => file,
        }
    }

    /// Only an explicit rejection or critical risk blocks. A failed analysis
    /// is a gap, not a failure.
    pub fn blocks(&self) -> bool {
        match self {
            VerdictEntry::Assessed(v) => v.blocks(),
            VerdictEntry::AnalysisFailed { .. } => false,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, VerdictEntry::AnalysisFailed { .. })
    }
}
