//! Blast radius: which files to show the reviewer alongside a change.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::DependencyGraph;
use crate::config::ExecutionConfig;
use crate::domain::change::ChangedFile;
use crate::git::is_oversized;

/// Dependents of one changed file, capped at `max_dependents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlastRadius {
    pub changed_file: ChangedFile,
    /// Importers in graph encounter order. Never contains `changed_file`.
    pub dependents: Vec<String>,
    /// More dependents qualified than the cap allowed.
    pub truncated: bool,
    /// Importers left out for being over the line ceiling or unreadable.
    #[serde(default)]
    pub oversized_dependents: Vec<String>,
}

impl BlastRadius {
    pub fn empty(changed_file: ChangedFile) -> Self {
        Self {
            changed_file,
            dependents: Vec::new(),
            truncated: false,
            oversized_dependents: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}

/// Compute the blast radius of `file`.
///
/// An importer counts as a dependent when any of its import strings contains
/// the changed file's base name (file name without directory or extension).
/// This is a textual test, not import resolution: `utils` also matches
/// `string-utils`, and aliased or re-exported imports are missed. Dependents
/// over the line ceiling (or unreadable under `root`) are dropped before the
/// cap is applied.
pub fn blast_radius(
    file: &ChangedFile,
    graph: &DependencyGraph,
    root: &Path,
    config: &ExecutionConfig,
) -> BlastRadius {
    let needle = file.base_name();
    if needle.is_empty() {
        return BlastRadius::empty(file.clone());
    }

    let mut dependents: Vec<String> = Vec::new();
    let mut oversized_dependents: Vec<String> = Vec::new();
    for (importer, imports) in graph.iter() {
        if importer == file.path {
            continue;
        }
        if !imports.iter().any(|import| import.contains(needle)) {
            continue;
        }
        if is_oversized(&root.join(importer), config) {
            oversized_dependents.push(importer.to_string());
            continue;
        }
        dependents.push(importer.to_string());
    }

    let truncated = dependents.len() > config.max_dependents;
    dependents.truncate(config.max_dependents);

    BlastRadius {
        changed_file: file.clone(),
        dependents,
        truncated,
        oversized_dependents,
    }
}
