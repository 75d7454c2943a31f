//! BlastGuard - dependency-aware risk gate
//!
//! The `blastguard` command asks a language model whether a change breaks
//! the files that import it, and fails the commit or the pull request if so.
//!
//! ## Commands
//!
//! - `check`: Review the staged change (or the PR diff with `--ci`)
//! - `install-hook`: Install a git pre-commit hook that runs `check`
//! - `config`: Print the resolved settings

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};

use blastguard_ci::{publish_report, GateDecision, GatePipeline};
use blastguard_core::{
    install_pre_commit_hook, repo_root, BuiltinScanner, ChangeSource, ConfigLayer,
    DependencyGraphAdapter, DiffFileChangeSource, GitChangeSource, GraphScanner, MadgeScanner,
    RunContext, RunResult, ScannerKind, Settings,
};
use blastguard_llm::{api_key_from_env, OpenAiClient, OpenAiConfig};

#[derive(Parser)]
#[command(name = "blastguard")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Block changes that break the files depending on them", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Repository directory (default: current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Review the current change against its dependents
    Check {
        /// Review the pull-request diff instead of staged changes
        /// (implied by CI=true or GITHUB_ACTIONS=true)
        #[arg(long)]
        ci: bool,

        /// Base branch for the pull-request diff (default: GITHUB_BASE_REF,
        /// then the configured base_branch)
        #[arg(long)]
        base: Option<String>,

        /// Print the run result as JSON instead of the Markdown report
        #[arg(long)]
        json: bool,

        /// Take the changed files from a saved unified diff instead of git
        #[arg(long, value_name = "PATH")]
        diff_file: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Install a pre-commit hook that runs `blastguard check`
    InstallHook {
        /// Replace an existing hook not written by blastguard
        #[arg(long)]
        force: bool,
    },

    /// Print the resolved settings
    Config {
        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Command-line settings. These win over the environment and the project file.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Skip the review when more code files than this changed
    #[arg(long)]
    max_files: Option<usize>,

    /// Skip files (and dependents) with more lines than this
    #[arg(long)]
    max_lines: Option<usize>,

    /// Dependents shown per changed file
    #[arg(long)]
    max_dependents: Option<usize>,

    /// Exclusion globs (comma-separated; replaces the configured list)
    #[arg(long, value_delimiter = ',')]
    exclude: Option<Vec<String>>,

    /// Analysed extensions (comma-separated; replaces the configured list)
    #[arg(long, value_delimiter = ',')]
    extensions: Option<Vec<String>>,

    /// Model name
    #[arg(long)]
    model: Option<String>,

    /// Verdict requests in flight at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Dependency-graph scanner (builtin or madge)
    #[arg(long)]
    scanner: Option<ScannerKind>,
}

impl Overrides {
    fn into_layer(self) -> ConfigLayer {
        ConfigLayer {
            max_files: self.max_files,
            max_lines_per_file: self.max_lines,
            max_dependents: self.max_dependents,
            exclude_patterns: self.exclude,
            allowed_extensions: self.extensions,
            model: self.model,
            concurrency: self.concurrency,
            scanner: self.scanner,
            ..ConfigLayer::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    blastguard_core::init_tracing(cli.json_logs, level);

    let start_dir = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    match cli.command {
        Commands::Check {
            ci,
            base,
            json,
            diff_file,
            overrides,
        } => cmd_check(&start_dir, ci, base, json, diff_file, overrides).await,
        Commands::InstallHook { force } => cmd_install_hook(&start_dir, force),
        Commands::Config { overrides } => cmd_config(&start_dir, overrides),
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Repository root containing `dir`, or `dir` itself outside a repository.
fn project_root(dir: &Path) -> PathBuf {
    repo_root(dir).unwrap_or_else(|_| dir.to_path_buf())
}

/// Merge project file, environment and command line, in that precedence order.
fn resolve_settings(
    root: &Path,
    overrides: Overrides,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    let mut layers = Vec::new();
    if let Some(project) =
        ConfigLayer::from_project_root(root).context("Failed to read .blastguard.toml")?
    {
        layers.push(project);
    }
    layers.push(ConfigLayer::from_env(lookup).context("Invalid BLASTGUARD_* environment")?);
    layers.push(overrides.into_layer());
    Settings::resolve(layers).context("Invalid configuration")
}

/// Local unless `--ci` or the CI environment says otherwise.
fn detect_context(
    ci_flag: bool,
    base: Option<String>,
    settings: &Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> RunContext {
    let is_true = |key: &str| {
        lookup(key)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false)
    };
    if !(ci_flag || is_true("CI") || is_true("GITHUB_ACTIONS")) {
        return RunContext::local();
    }

    let base = base
        .or_else(|| lookup("GITHUB_BASE_REF").filter(|b| !b.trim().is_empty()))
        .unwrap_or_else(|| settings.execution.base_branch.clone());
    RunContext::ci(Some(base))
}

fn scanner_for(kind: ScannerKind) -> Result<Arc<dyn GraphScanner>> {
    let scanner: Arc<dyn GraphScanner> = match kind {
        ScannerKind::Builtin => {
            Arc::new(BuiltinScanner::new().context("Failed to build import scanner")?)
        }
        ScannerKind::Madge => Arc::new(MadgeScanner::new()),
    };
    Ok(scanner)
}

/// Changed files come from `diff_file` when given, else from git.
fn change_source_for(root: &Path, diff_file: Option<PathBuf>) -> Arc<dyn ChangeSource> {
    match diff_file {
        Some(path) => {
            info!(diff = %path.display(), "reading changed files from diff file");
            Arc::new(DiffFileChangeSource::new(path))
        }
        None => Arc::new(GitChangeSource::new(root)),
    }
}

async fn cmd_check(
    start_dir: &Path,
    ci: bool,
    base: Option<String>,
    json: bool,
    diff_file: Option<PathBuf>,
    overrides: Overrides,
) -> Result<ExitCode> {
    // Missing credentials abort before anything else runs.
    let api_key = api_key_from_env(env_var)?;

    let root = project_root(start_dir);
    let settings = resolve_settings(&root, overrides, env_var)?;
    let context = detect_context(ci, base, &settings, env_var);

    let client = OpenAiClient::new(
        OpenAiConfig::new(settings.execution.model.clone(), api_key)
            .with_endpoint(settings.inference.endpoint.clone())
            .with_timeout_secs(settings.inference.timeout_secs),
    )?;

    let pipeline = GatePipeline::new(
        root.clone(),
        settings.execution.clone(),
        change_source_for(&root, diff_file),
        DependencyGraphAdapter::new(scanner_for(settings.scanner)?),
        Arc::new(client),
    );

    let outcome = pipeline.run(&context).await.context("Gate run failed")?;
    let decision = GateDecision::from_result(&outcome.result, &context);

    print!("{}", check_output(&outcome.result, &decision, json)?);

    publish_report(&outcome.result, &context, env_var).await;

    info!(run_id = %outcome.run_id, exit_code = decision.exit_code, "{}", decision.message);
    Ok(if decision.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Stdout for `check`: the JSON document alone, or the report followed by
/// any workflow annotations. Annotations would break the JSON document.
fn check_output(result: &RunResult, decision: &GateDecision, json: bool) -> Result<String> {
    if json {
        return Ok(format!("{}\n", result.to_json()?));
    }
    let mut out = result.report.clone();
    for annotation in &decision.annotations {
        out.push_str(annotation);
        out.push('\n');
    }
    Ok(out)
}

fn cmd_install_hook(start_dir: &Path, force: bool) -> Result<ExitCode> {
    let root = repo_root(start_dir).context("Not inside a git repository")?;
    let hook = install_pre_commit_hook(&root, force)?;
    println!("Installed pre-commit hook at {}", hook.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_config(start_dir: &Path, overrides: Overrides) -> Result<ExitCode> {
    let root = project_root(start_dir);
    let settings = resolve_settings(&root, overrides, env_var)?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blastguard_core::{
        aggregate, Assessment, BlastRadius, ChangedFile, Outcome, Risk, Verdict, VerdictEntry,
    };
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_cli_parses_check_overrides() {
        let cli = Cli::try_parse_from([
            "blastguard",
            "check",
            "--ci",
            "--base",
            "develop",
            "--max-files",
            "5",
            "--exclude",
            "**/gen/**,**/*.d.ts",
            "--scanner",
            "madge",
        ])
        .unwrap();
        match cli.command {
            Commands::Check {
                ci,
                base,
                overrides,
                ..
            } => {
                assert!(ci);
                assert_eq!(base.as_deref(), Some("develop"));
                let layer = overrides.into_layer();
                assert_eq!(layer.max_files, Some(5));
                assert_eq!(
                    layer.exclude_patterns,
                    Some(vec!["**/gen/**".to_string(), "**/*.d.ts".to_string()])
                );
                assert_eq!(layer.scanner, Some(ScannerKind::Madge));
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_scanner() {
        assert!(Cli::try_parse_from(["blastguard", "check", "--scanner", "eslint"]).is_err());
    }

    #[test]
    fn test_precedence_override_env_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".blastguard.toml"),
            "max_files = 30\nmax_lines_per_file = 100\nmodel = \"from-file\"\n",
        )
        .unwrap();
        let overrides = Overrides {
            max_files: Some(3),
            ..Overrides::default()
        };

        let settings = resolve_settings(
            dir.path(),
            overrides,
            env(&[("BLASTGUARD_MAX_FILES", "10"), ("BLASTGUARD_MODEL", "from-env")]),
        )
        .unwrap();

        assert_eq!(settings.execution.max_files, 3);
        assert_eq!(settings.execution.model, "from-env");
        assert_eq!(settings.execution.max_lines_per_file, 100);
        assert_eq!(settings.execution.max_dependents, 2);
    }

    #[test]
    fn test_invalid_env_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_settings(
            dir.path(),
            Overrides::default(),
            env(&[("BLASTGUARD_MAX_FILES", "many")]),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("BLASTGUARD_MAX_FILES"));
    }

    #[test]
    fn test_detect_context() {
        let settings = Settings::default();

        assert_eq!(
            detect_context(false, None, &settings, env(&[])),
            RunContext::local()
        );
        assert_eq!(
            detect_context(
                false,
                None,
                &settings,
                env(&[("GITHUB_ACTIONS", "true"), ("GITHUB_BASE_REF", "release")])
            ),
            RunContext::ci(Some("release".into()))
        );
        assert_eq!(
            detect_context(true, None, &settings, env(&[("GITHUB_BASE_REF", "")])),
            RunContext::ci(Some("main".into()))
        );
        assert_eq!(
            detect_context(false, Some("dev".into()), &settings, env(&[("CI", "1")])),
            RunContext::ci(Some("dev".into()))
        );
    }

    #[test]
    fn test_cli_parses_diff_file() {
        let cli =
            Cli::try_parse_from(["blastguard", "check", "--diff-file", "change.diff"]).unwrap();
        match cli.command {
            Commands::Check { diff_file, .. } => {
                assert_eq!(diff_file, Some(PathBuf::from("change.diff")));
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn test_diff_file_replaces_git_as_change_source() {
        let dir = tempfile::tempdir().unwrap();
        let diff = dir.path().join("change.diff");
        std::fs::write(
            &diff,
            "diff --git a/src/utils.ts b/src/utils.ts\n--- a/src/utils.ts\n+++ b/src/utils.ts\n",
        )
        .unwrap();

        // Not a git repository: only the diff file can yield changes.
        let files = change_source_for(dir.path(), Some(diff)).resolve(&RunContext::local());
        assert_eq!(files, vec![ChangedFile::new("src/utils.ts")]);
        assert!(change_source_for(dir.path(), None)
            .resolve(&RunContext::local())
            .is_empty());
    }

    fn blocked_result() -> RunResult {
        aggregate(
            vec![Assessment::new(
                BlastRadius {
                    changed_file: ChangedFile::new("src/utils.ts"),
                    dependents: vec!["src/billing.ts".into()],
                    truncated: false,
                    oversized_dependents: Vec::new(),
                },
                VerdictEntry::Assessed(Verdict {
                    file: "src/utils.ts".into(),
                    outcome: Outcome::Rejected,
                    risk: Risk::Critical,
                    reason: "type mismatch".into(),
                }),
            )],
            vec![],
        )
    }

    #[test]
    fn test_json_output_stays_valid_in_ci() {
        let result = blocked_result();
        let decision = GateDecision::from_result(&result, &RunContext::ci(None));
        assert!(!decision.annotations.is_empty());

        let out = check_output(&result, &decision, true).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["blocked"], true);
        assert!(!out.contains("::error"));

        let text = check_output(&result, &decision, false).unwrap();
        assert!(text.starts_with(&result.report));
        assert!(text.contains("::error file=src/utils.ts::"));
    }

    #[tokio::test]
    async fn test_check_without_credential_fails_first() {
        if std::env::var("OPENAI_API_KEY").is_ok() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_check(dir.path(), false, None, false, None, Overrides::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
