//! BlastGuard Core Library
//!
//! Change resolution, filtering, blast-radius mapping, verdict requests and
//! aggregation for the risk gate. Orchestration lives in `blastguard-ci`.

pub mod aggregate;
pub mod config;
pub mod diff_file;
pub mod domain;
pub mod filter;
pub mod git;
pub mod graph;
pub mod interpret;
pub mod metrics;
pub mod obs;
pub mod request;
pub mod telemetry;

pub use aggregate::{aggregate, Assessment, RunOutcome, RunResult};

pub use config::{ConfigLayer, ExecutionConfig, InferenceSettings, ScannerKind, Settings};

pub use domain::{
    BlastGuardError, ChangedFile, Outcome, Result, Risk, RunContext, RunMode, SkipReason,
    SkippedFile, Verdict, VerdictEntry,
};

pub use diff_file::{parse_unified_diff, DiffFileChangeSource};

pub use filter::{CircuitBreaker, ExclusionFilter, FilterOutcome};

pub use git::{
    install_pre_commit_hook, is_git_repo, is_oversized, repo_root, ChangeSource, GitChangeSource,
};

pub use graph::{
    blast_radius, BlastRadius, BuiltinScanner, DependencyGraph, DependencyGraphAdapter,
    GraphScanner, MadgeScanner,
};

pub use interpret::{interpret, interpret_response};

pub use metrics::{MetricsSnapshot, METRICS};

pub use request::AnalysisRequest;

pub use telemetry::init_tracing;

/// Crate version, for `--version` output and comment footers.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
