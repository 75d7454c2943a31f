//! Graph scanners.
//!
//! [`BuiltinScanner`] walks the tree itself and pulls import specifiers out
//! of each source file with a regular expression. [`MadgeScanner`] shells out
//! to `npx madge --json`, which resolves specifiers to real paths.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use super::{DependencyGraph, GraphScanner, IGNORED_DIRS};
use crate::config::ExecutionConfig;
use crate::domain::change::ChangedFile;
use crate::domain::error::{BlastGuardError, Result};
use crate::filter::ExclusionFilter;

// `import x from '..'`, `export { y } from '..'`, `import '..'`,
// `require('..')` and dynamic `import('..')`.
const IMPORT_PATTERN: &str = r#"(?:(?:import|export)\s[^'";]*?\bfrom\s*['"]([^'"\n]+)['"])|(?:\bimport\s*['"]([^'"\n]+)['"])|(?:\b(?:require|import)\s*\(\s*['"]([^'"\n]+)['"]\s*\))"#;

// ---------------------------------------------------------------------------
// Builtin
// ---------------------------------------------------------------------------

/// Regex-based scanner with no external tooling.
#[derive(Debug, Clone)]
pub struct BuiltinScanner {
    import_re: Regex,
}

impl BuiltinScanner {
    pub fn new() -> Result<Self> {
        let import_re = Regex::new(IMPORT_PATTERN)
            .map_err(|e| BlastGuardError::InvalidConfig(format!("import pattern: {e}")))?;
        Ok(Self { import_re })
    }

    /// Import specifiers in `source`, in order of appearance. Relative
    /// specifiers are resolved against `importer`'s directory.
    pub fn extract_imports(&self, importer: &str, source: &str) -> Vec<String> {
        self.import_re
            .captures_iter(source)
            .filter_map(|caps| caps.iter().skip(1).flatten().next())
            .map(|m| resolve_specifier(importer, m.as_str()))
            .collect()
    }

    /// Synchronous scan of every analysable file under `root`.
    pub fn scan_tree(&self, root: &Path, config: &ExecutionConfig) -> Result<DependencyGraph> {
        if !root.is_dir() {
            return Err(BlastGuardError::GraphUnavailable(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let filter = ExclusionFilter::new(config)?;
        let mut graph = DependencyGraph::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_ignored_dir(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(rel) = relative_path(root, entry.path()) else {
                continue;
            };
            if filter.rejection(&ChangedFile::new(rel.as_str())).is_some() {
                continue;
            }
            let Ok(source) = std::fs::read_to_string(entry.path()) else {
                debug!(path = %rel, "skipping non-text file");
                continue;
            };
            let imports = self.extract_imports(&rel, &source);
            graph.insert(rel, imports);
        }

        Ok(graph)
    }
}

#[async_trait]
impl GraphScanner for BuiltinScanner {
    fn name(&self) -> &'static str {
        "builtin"
    }

    async fn scan(&self, root: &Path, config: &ExecutionConfig) -> Result<DependencyGraph> {
        let scanner = self.clone();
        let root = root.to_path_buf();
        let config = config.clone();
        tokio::task::spawn_blocking(move || scanner.scan_tree(&root, &config))
            .await
            .map_err(|e| BlastGuardError::GraphUnavailable(format!("scan task failed: {e}")))?
    }
}

fn is_ignored_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| IGNORED_DIRS.contains(&name))
            .unwrap_or(false)
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

/// Lexically join a relative specifier onto the importer's directory.
/// Bare package specifiers are returned unchanged.
fn resolve_specifier(importer: &str, specifier: &str) -> String {
    if !specifier.starts_with('.') {
        return specifier.to_string();
    }
    let base = Path::new(importer).parent().unwrap_or(Path::new(""));
    let mut parts: Vec<String> = Vec::new();
    for component in base.join(specifier).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                // Escaping the root keeps the `..` so the text still names it.
                if parts.last().map(|p| p != "..").unwrap_or(false) {
                    parts.pop();
                } else {
                    parts.push("..".to_string());
                }
            }
            _ => {}
        }
    }
    parts.join("/")
}

// ---------------------------------------------------------------------------
// Madge
// ---------------------------------------------------------------------------

pub const DEFAULT_MADGE_TIMEOUT_SECS: u64 = 120;

/// Scanner backed by `npx madge --json`.
#[derive(Debug, Clone)]
pub struct MadgeScanner {
    program: PathBuf,
    timeout: Duration,
}

impl Default for MadgeScanner {
    fn default() -> Self {
        Self {
            program: PathBuf::from("npx"),
            timeout: Duration::from_secs(DEFAULT_MADGE_TIMEOUT_SECS),
        }
    }
}

impl MadgeScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different launcher than `npx` (e.g. an absolute path).
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn args(config: &ExecutionConfig) -> Vec<String> {
        let extensions = config
            .allowed_extensions
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(",");
        vec![
            "--yes".to_string(),
            "madge".to_string(),
            "--json".to_string(),
            "--extensions".to_string(),
            extensions,
            ".".to_string(),
        ]
    }
}

#[async_trait]
impl GraphScanner for MadgeScanner {
    fn name(&self) -> &'static str {
        "madge"
    }

    async fn scan(&self, root: &Path, config: &ExecutionConfig) -> Result<DependencyGraph> {
        let child = Command::new(&self.program)
            .args(Self::args(config))
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BlastGuardError::GraphUnavailable(format!(
                    "failed to launch {}: {e}",
                    self.program.display()
                ))
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                BlastGuardError::GraphUnavailable(format!(
                    "madge timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BlastGuardError::GraphUnavailable(format!(
                "madge exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let filter = ExclusionFilter::new(config)?;
        parse_madge_output(&output.stdout, &filter)
    }
}

/// Decode madge's `{ "file": ["dep", ...] }` object, dropping excluded
/// importers.
fn parse_madge_output(stdout: &[u8], filter: &ExclusionFilter) -> Result<DependencyGraph> {
    let raw: BTreeMap<String, Vec<String>> = serde_json::from_slice(stdout)
        .map_err(|e| BlastGuardError::GraphUnavailable(format!("unreadable madge output: {e}")))?;

    Ok(raw
        .into_iter()
        .filter(|(importer, _)| filter.rejection(&ChangedFile::new(importer.as_str())).is_none())
        .collect())
}
