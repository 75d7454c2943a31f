//! Execution configuration and its merge rules.
//!
//! Every source (project file, environment, command-line overrides) is read
//! into a [`ConfigLayer`] of optional fields. [`Settings::resolve`] folds the
//! layers over the built-in defaults, highest precedence last, and validates
//! the result once. Components receive the resolved values by reference and
//! never consult the environment themselves.

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::{BlastGuardError, Result};
use crate::filter::ExclusionFilter;

/// Project configuration file, looked up at the repository root.
pub const CONFIG_FILE_NAME: &str = ".blastguard.toml";

pub const DEFAULT_MAX_FILES: usize = 15;
pub const DEFAULT_MAX_LINES_PER_FILE: usize = 400;
pub const DEFAULT_MAX_DEPENDENTS: usize = 2;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ENDPOINT: &str = blastguard_llm::DEFAULT_ENDPOINT;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const DEFAULT_EXTENSIONS: [&str; 4] = ["ts", "tsx", "js", "jsx"];
const DEFAULT_EXCLUDES: [&str; 4] = [
    "**/node_modules/**",
    "**/dist/**",
    "**/*.test.*",
    "**/*.spec.*",
];

/// Thresholds and filters for one run. All ceilings are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Circuit-breaker ceiling on analysable changed files.
    pub max_files: usize,
    /// Files with more line breaks than this are never analysed.
    pub max_lines_per_file: usize,
    /// Cap on dependents shown as context per changed file.
    pub max_dependents: usize,
    pub exclude_patterns: Vec<String>,
    pub allowed_extensions: BTreeSet<String>,
    pub model: String,
    /// Verdict requests in flight at once. 1 keeps the sequential behaviour.
    pub concurrency: usize,
    pub base_branch: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_lines_per_file: DEFAULT_MAX_LINES_PER_FILE,
            max_dependents: DEFAULT_MAX_DEPENDENTS,
            exclude_patterns: DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect(),
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            model: DEFAULT_MODEL.to_string(),
            concurrency: 1,
            base_branch: "main".to_string(),
        }
    }
}

/// Which dependency-graph scanner to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerKind {
    /// In-process import extraction.
    #[default]
    Builtin,
    /// `npx madge --json`.
    Madge,
}

impl FromStr for ScannerKind {
    type Err = BlastGuardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "builtin" => Ok(ScannerKind::Builtin),
            "madge" => Ok(ScannerKind::Madge),
            other => Err(BlastGuardError::InvalidConfig(format!(
                "unknown scanner '{other}' (expected 'builtin' or 'madge')"
            ))),
        }
    }
}

/// Settings for the inference transport. The model name lives in
/// [`ExecutionConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceSettings {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Fully resolved, immutable settings for one invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Settings {
    pub execution: ExecutionConfig,
    pub inference: InferenceSettings,
    pub scanner: ScannerKind,
}

/// One configuration source. `None` means "not set here".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub max_files: Option<usize>,
    pub max_lines_per_file: Option<usize>,
    pub max_dependents: Option<usize>,
    pub exclude_patterns: Option<Vec<String>>,
    pub allowed_extensions: Option<Vec<String>>,
    pub model: Option<String>,
    pub concurrency: Option<usize>,
    pub base_branch: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub scanner: Option<ScannerKind>,
}

impl ConfigLayer {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Load `.blastguard.toml` from `root`. A missing file is not an error.
    pub fn from_project_root(root: &Path) -> Result<Option<Self>> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&raw).map(Some)
    }

    /// Read `BLASTGUARD_*` variables through `lookup`.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            max_files: parse_env(&get, "BLASTGUARD_MAX_FILES")?,
            max_lines_per_file: parse_env(&get, "BLASTGUARD_MAX_LINES")?,
            max_dependents: parse_env(&get, "BLASTGUARD_MAX_DEPENDENTS")?,
            exclude_patterns: get("BLASTGUARD_EXCLUDE").map(|v| split_list(&v)),
            allowed_extensions: get("BLASTGUARD_EXTENSIONS").map(|v| split_list(&v)),
            model: get("BLASTGUARD_MODEL"),
            concurrency: parse_env(&get, "BLASTGUARD_CONCURRENCY")?,
            base_branch: get("BLASTGUARD_BASE_BRANCH"),
            endpoint: get("BLASTGUARD_ENDPOINT"),
            timeout_secs: parse_env(&get, "BLASTGUARD_TIMEOUT_SECS")?,
            scanner: get("BLASTGUARD_SCANNER")
                .map(|v| v.parse::<ScannerKind>())
                .transpose()?,
        })
    }

    /// Return `self` with every field set in `higher` replaced.
    pub fn overlay(self, higher: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            max_files: higher.max_files.or(self.max_files),
            max_lines_per_file: higher.max_lines_per_file.or(self.max_lines_per_file),
            max_dependents: higher.max_dependents.or(self.max_dependents),
            exclude_patterns: higher.exclude_patterns.or(self.exclude_patterns),
            allowed_extensions: higher.allowed_extensions.or(self.allowed_extensions),
            model: higher.model.or(self.model),
            concurrency: higher.concurrency.or(self.concurrency),
            base_branch: higher.base_branch.or(self.base_branch),
            endpoint: higher.endpoint.or(self.endpoint),
            timeout_secs: higher.timeout_secs.or(self.timeout_secs),
            scanner: higher.scanner.or(self.scanner),
        }
    }
}

impl Settings {
    /// Merge `layers` (lowest precedence first) over the built-in defaults.
    pub fn resolve(layers: impl IntoIterator<Item = ConfigLayer>) -> Result<Self> {
        let merged = layers
            .into_iter()
            .fold(ConfigLayer::default(), ConfigLayer::overlay);

        let defaults = Settings::default();
        let execution = ExecutionConfig {
            max_files: merged.max_files.unwrap_or(defaults.execution.max_files),
            max_lines_per_file: merged
                .max_lines_per_file
                .unwrap_or(defaults.execution.max_lines_per_file),
            max_dependents: merged
                .max_dependents
                .unwrap_or(defaults.execution.max_dependents),
            exclude_patterns: merged
                .exclude_patterns
                .unwrap_or(defaults.execution.exclude_patterns),
            allowed_extensions: merged
                .allowed_extensions
                .map(|exts| exts.iter().map(|e| normalize_extension(e)).collect())
                .unwrap_or(defaults.execution.allowed_extensions),
            model: merged.model.unwrap_or(defaults.execution.model),
            concurrency: merged.concurrency.unwrap_or(defaults.execution.concurrency),
            base_branch: merged.base_branch.unwrap_or(defaults.execution.base_branch),
        };
        let inference = InferenceSettings {
            endpoint: merged.endpoint.unwrap_or(defaults.inference.endpoint),
            timeout_secs: merged
                .timeout_secs
                .unwrap_or(defaults.inference.timeout_secs),
        };

        let settings = Settings {
            execution,
            inference,
            scanner: merged.scanner.unwrap_or_default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        let exec = &self.execution;
        if exec.concurrency == 0 {
            return Err(BlastGuardError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if exec.max_dependents == 0 {
            return Err(BlastGuardError::InvalidConfig(
                "max_dependents must be at least 1".to_string(),
            ));
        }
        if exec.allowed_extensions.iter().any(|e| e.is_empty()) {
            return Err(BlastGuardError::InvalidConfig(
                "allowed_extensions must not contain empty entries".to_string(),
            ));
        }
        if exec.model.trim().is_empty() {
            return Err(BlastGuardError::InvalidConfig(
                "model must not be empty".to_string(),
            ));
        }
        if self.inference.timeout_secs == 0 {
            return Err(BlastGuardError::InvalidConfig(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        // Surfaces malformed globs now rather than mid-run.
        ExclusionFilter::new(exec)?;
        Ok(())
    }
}

fn parse_env<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match get(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            BlastGuardError::InvalidConfig(format!("{key} must be a non-negative integer, got '{raw}'"))
        }),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}
