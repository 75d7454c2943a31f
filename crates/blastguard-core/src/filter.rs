//! Exclusion filtering and the file-count circuit breaker.
//!
//! Both run before any expensive work. The filter narrows the change set to
//! analysable code; the breaker then decides whether the remainder is small
//! enough to review at all.

use std::collections::BTreeSet;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::config::ExecutionConfig;
use crate::domain::change::ChangedFile;
use crate::domain::error::{BlastGuardError, Result};
use crate::domain::skip::{SkipReason, SkippedFile};

/// Files kept for analysis and the ones dropped, both in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub kept: Vec<ChangedFile>,
    pub excluded: Vec<SkippedFile>,
}

/// Extension allow-list plus glob exclusions.
///
/// Globs use path semantics: `*` stays within one segment, `**` crosses
/// separators.
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    allowed_extensions: BTreeSet<String>,
    patterns: Vec<String>,
    excludes: GlobSet,
}

impl ExclusionFilter {
    pub fn new(config: &ExecutionConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude_patterns {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| BlastGuardError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.kind().to_string(),
                })?;
            builder.add(glob);
        }
        let excludes = builder.build().map_err(|e| BlastGuardError::InvalidPattern {
            pattern: config.exclude_patterns.join(", "),
            reason: e.to_string(),
        })?;

        Ok(Self {
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            patterns: config.exclude_patterns.clone(),
            excludes,
        })
    }

    /// Why `file` would be dropped, or `None` if it is analysable.
    pub fn rejection(&self, file: &ChangedFile) -> Option<SkipReason> {
        let allowed = file
            .extension()
            .map(|ext| self.allowed_extensions.contains(&ext.to_ascii_lowercase()))
            .unwrap_or(false);
        if !allowed {
            return Some(SkipReason::ExtensionNotAllowed);
        }

        self.excludes
            .matches(&file.path)
            .first()
            .map(|&idx| SkipReason::Excluded {
                pattern: self.patterns[idx].clone(),
            })
    }

    /// Split `files` into analysable and excluded, preserving order.
    pub fn partition(&self, files: Vec<ChangedFile>) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        for file in files {
            match self.rejection(&file) {
                None => outcome.kept.push(file),
                Some(reason) => outcome.excluded.push(SkippedFile::new(file.path, reason)),
            }
        }
        outcome
    }

    /// Only the analysable files, in input order.
    pub fn filter(&self, files: Vec<ChangedFile>) -> Vec<ChangedFile> {
        self.partition(files).kept
    }
}

/// Hard ceiling on how many files a run may analyse.
///
/// Tripping the breaker means "not reviewed", never "approved".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreaker {
    pub max_files: usize,
}

impl CircuitBreaker {
    pub fn new(config: &ExecutionConfig) -> Self {
        Self {
            max_files: config.max_files,
        }
    }

    /// True iff there are strictly more files than the ceiling.
    pub fn should_skip_run(&self, files: &[ChangedFile]) -> bool {
        files.len() > self.max_files
    }
}
