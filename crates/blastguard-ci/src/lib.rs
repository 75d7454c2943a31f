//! BlastGuard CI - the risk gate run
//!
//! Provides the run controller that:
//! - Resolves, filters and bounds the change set
//! - Maps each changed file to its blast radius
//! - Requests verdicts with bounded concurrency
//! - Turns the aggregate into an exit code, CI annotations and a PR comment

pub mod gate;
pub mod github;
pub mod pipeline;
pub mod runner;

// Re-export key types
pub use gate::GateDecision;
pub use github::{
    publish_report, CommentError, CommentStatus, GitHubCommenter, PullRequestRef,
};
pub use pipeline::{GatePipeline, PipelineResult};
pub use runner::{PlannedReview, VerdictRunner};
