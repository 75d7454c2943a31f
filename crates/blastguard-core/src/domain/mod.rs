//! Domain models for BlastGuard.
//!
//! Canonical definitions for the core entities:
//! - `ChangedFile`: one path produced by change-set resolution
//! - `RunContext`: local pre-commit vs. CI pre-merge execution
//! - `Verdict` / `VerdictEntry`: the per-file outcome of an assessment
//! - `SkippedFile`: a file that was deliberately not reviewed, and why

pub mod change;
pub mod error;
pub mod skip;
pub mod verdict;

// Re-export main types and errors
pub use change::{ChangedFile, RunContext, RunMode};
pub use error::{BlastGuardError, Result};
pub use skip::{SkipReason, SkippedFile};
pub use verdict::{Outcome, Risk, Verdict, VerdictEntry};
