//! Process-wide counters for gate runs.
//!
//! Counters only grow. [`Metrics::flush`] logs a [`MetricsSnapshot`] as one
//! `info!` event when a run ends; tests compare snapshots taken before and
//! after a run.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    inference_calls: AtomicU64,
    analysis_failures: AtomicU64,
    files_skipped: AtomicU64,
    dependents_truncated: AtomicU64,
    dependents_dropped: AtomicU64,
}

/// Counter values at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub inference_calls: u64,
    pub analysis_failures: u64,
    pub files_skipped: u64,
    pub dependents_truncated: u64,
    /// Dependents left out of a request for being over the line ceiling.
    pub dependents_dropped: u64,
}

impl MetricsSnapshot {
    /// Per-counter difference `self - earlier`.
    pub fn since(&self, earlier: &MetricsSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            inference_calls: self.inference_calls.saturating_sub(earlier.inference_calls),
            analysis_failures: self.analysis_failures.saturating_sub(earlier.analysis_failures),
            files_skipped: self.files_skipped.saturating_sub(earlier.files_skipped),
            dependents_truncated: self
                .dependents_truncated
                .saturating_sub(earlier.dependents_truncated),
            dependents_dropped: self.dependents_dropped.saturating_sub(earlier.dependents_dropped),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            inference_calls: AtomicU64::new(0),
            analysis_failures: AtomicU64::new(0),
            files_skipped: AtomicU64::new(0),
            dependents_truncated: AtomicU64::new(0),
            dependents_dropped: AtomicU64::new(0),
        }
    }

    pub fn inc_inference_calls(&self) {
        self.inference_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_analysis_failures(&self) {
        self.analysis_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `n` files that left the analysis set without a verdict.
    pub fn add_files_skipped(&self, n: u64) {
        self.files_skipped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_dependents_truncated(&self) {
        self.dependents_truncated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_dependents_dropped(&self, n: u64) {
        self.dependents_dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            inference_calls: self.inference_calls.load(Ordering::Relaxed),
            analysis_failures: self.analysis_failures.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            dependents_truncated: self.dependents_truncated.load(Ordering::Relaxed),
            dependents_dropped: self.dependents_dropped.load(Ordering::Relaxed),
        }
    }

    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            inference_calls = s.inference_calls,
            analysis_failures = s.analysis_failures,
            files_skipped = s.files_skipped,
            dependents_truncated = s.dependents_truncated,
            dependents_dropped = s.dependents_dropped,
        );
    }
}
