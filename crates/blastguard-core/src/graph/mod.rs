//! Dependency graph: who imports what.
//!
//! The graph is produced by a [`GraphScanner`] over the whole project tree
//! and queried read-only for the rest of the run. Blast-radius matching is a
//! substring test on import specifiers; see [`radius::blast_radius`].

pub mod radius;
pub mod scanner;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::ExecutionConfig;
use crate::domain::error::{BlastGuardError, Result};
use crate::obs;

pub use radius::{blast_radius, BlastRadius};
pub use scanner::{BuiltinScanner, MadgeScanner};

/// Directories never scanned: version control, installed dependencies and
/// build output.
pub const IGNORED_DIRS: [&str; 7] = [
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "bower_components",
    "target",
    "dist",
];

/// Mapping from importer path to the specifiers it imports.
///
/// Keys are repository-relative paths. Iteration order is sorted by importer
/// so blast-radius encounter order is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `importer` imports each of `imports`.
    pub fn insert<I, S>(&mut self, importer: impl AsRef<str>, imports: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self
            .edges
            .entry(normalize_key(importer.as_ref()))
            .or_default();
        entry.extend(imports.into_iter().map(Into::into));
    }

    pub fn imports_of(&self, importer: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(normalize_key(importer).as_str())
    }

    /// `(importer, imports)` pairs in importer order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.edges.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

impl<K, V, S> FromIterator<(K, V)> for DependencyGraph
where
    K: AsRef<str>,
    V: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut graph = DependencyGraph::new();
        for (importer, imports) in iter {
            graph.insert(importer, imports);
        }
        graph
    }
}

fn normalize_key(path: &str) -> String {
    path.trim_start_matches("./").replace('\\', "/")
}

/// Anything that can scan a project tree into a [`DependencyGraph`].
#[async_trait]
pub trait GraphScanner: Send + Sync {
    /// Scanner name, for logging.
    fn name(&self) -> &'static str;

    async fn scan(&self, root: &Path, config: &ExecutionConfig) -> Result<DependencyGraph>;
}

/// Wraps a scanner and turns any failure into `GraphUnavailable`.
#[derive(Clone)]
pub struct DependencyGraphAdapter {
    scanner: Arc<dyn GraphScanner>,
}

impl DependencyGraphAdapter {
    pub fn new(scanner: Arc<dyn GraphScanner>) -> Self {
        Self { scanner }
    }

    /// Scan the whole tree under `root`.
    pub async fn build_graph(&self, root: &Path, config: &ExecutionConfig) -> Result<DependencyGraph> {
        match self.scanner.scan(root, config).await {
            Ok(graph) => {
                info!(
                    event = "graph.built",
                    scanner = self.scanner.name(),
                    importers = graph.len()
                );
                Ok(graph)
            }
            Err(e) => {
                obs::emit_graph_unavailable(self.scanner.name(), &e);
                Err(match e {
                    BlastGuardError::GraphUnavailable(_) => e,
                    other => BlastGuardError::GraphUnavailable(other.to_string()),
                })
            }
        }
    }
}
