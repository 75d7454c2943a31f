//! Structured observability hooks for the gate run lifecycle.
//!
//! Every event carries an `event` field so log pipelines can filter on it.
//! Anything that leaves a file un-reviewed is logged at `warn!` so it shows
//! up at the default verbosity.

use tracing::{info, warn, Span};

use crate::domain::change::RunMode;
use crate::domain::skip::SkipReason;
use crate::domain::verdict::{Verdict, VerdictEntry};

/// Span tagging everything inside one run with its `run_id`.
///
/// Attach it to the run future with `tracing::Instrument` rather than
/// entering it, so it survives across await points.
pub fn run_span(run_id: &str) -> Span {
    tracing::info_span!("blastguard.run", run_id = %run_id)
}

pub fn emit_run_started(run_id: &str, mode: RunMode, changed_files: usize) {
    info!(event = "run.started", run_id = %run_id, mode = ?mode, changed_files);
}

/// Circuit breaker tripped.
pub fn emit_run_skipped(run_id: &str, analysable_files: usize, max_files: usize) {
    warn!(
        event = "run.skipped",
        run_id = %run_id,
        analysable_files,
        max_files,
        "massive change, skipping review"
    );
}

pub fn emit_file_skipped(path: &str, reason: &SkipReason) {
    match reason {
        SkipReason::Oversized { max_lines } => {
            warn!(event = "file.oversized", path = %path, max_lines = *max_lines);
        }
        SkipReason::OversizedDependent { changed, max_lines } => {
            warn!(
                event = "file.oversized",
                path = %path,
                changed = %changed,
                max_lines = *max_lines,
                "dependent left out of review context"
            );
        }
        SkipReason::ExtensionNotAllowed | SkipReason::Excluded { .. } => {
            info!(event = "file.excluded", path = %path, reason = %reason);
        }
        SkipReason::NoDependents | SkipReason::GraphUnavailable => {
            info!(event = "file.skipped", path = %path, reason = %reason);
        }
    }
}

pub fn emit_graph_unavailable(scanner: &str, error: &dyn std::fmt::Display) {
    warn!(event = "graph.unavailable", scanner = %scanner, error = %error);
}

pub fn emit_radius_computed(file: &str, dependents: usize, truncated: bool) {
    info!(event = "radius.computed", file = %file, dependents, truncated);
    if truncated {
        warn!(event = "radius.truncated", file = %file, shown = dependents);
    }
}

/// One file's entry, with the fingerprint of the request that produced it.
pub fn emit_entry_recorded(entry: &VerdictEntry, fingerprint: &str) {
    match entry {
        VerdictEntry::Assessed(Verdict {
            file,
            outcome,
            risk,
            ..
        }) => {
            info!(
                event = "verdict.recorded",
                file = %file,
                outcome = ?outcome,
                risk = ?risk,
                blocks = entry.blocks(),
                fingerprint = %fingerprint,
            );
        }
        VerdictEntry::AnalysisFailed { file, cause } => {
            warn!(
                event = "analysis.failed",
                file = %file,
                cause = %cause,
                fingerprint = %fingerprint,
            );
        }
    }
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, verdicts: usize, blocked: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms,
        verdicts,
        blocked,
    );
}
