//! Git integration: change-set resolution, size checks and hook install.
//!
//! Change resolution is fail-open. If git cannot answer (not a repository,
//! shallow clone missing the merge-base, git not installed) the resolver
//! logs a warning and reports no changes.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::config::ExecutionConfig;
use crate::domain::change::{ChangedFile, RunContext, RunMode};
use crate::domain::error::{BlastGuardError, Result};

/// Marker line identifying a hook written by `install_pre_commit_hook`.
pub const HOOK_MARKER: &str = "# installed by blastguard";

/// Source of the changed-file list for a run.
pub trait ChangeSource: Send + Sync {
    /// Changed files in the order the underlying diff reports them.
    /// Never fails: an unavailable source yields an empty list.
    fn resolve(&self, context: &RunContext) -> Vec<ChangedFile>;
}

/// `ChangeSource` backed by the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitChangeSource {
    repo_dir: PathBuf,
}

impl GitChangeSource {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    /// Files staged for commit: added, copied or modified. Deletions excluded.
    pub fn staged_files(&self) -> Result<Vec<ChangedFile>> {
        let out = run_git(
            &self.repo_dir,
            &["diff", "--cached", "--name-only", "-z", "--diff-filter=ACM"],
        )?;
        Ok(parse_name_list(&out))
    }

    /// Files changed on `HEAD` since its merge-base with `origin/<base>`.
    pub fn merge_base_files(&self, base: &str) -> Result<Vec<ChangedFile>> {
        let remote_ref = if base.starts_with("origin/") {
            base.to_string()
        } else {
            format!("origin/{base}")
        };
        let range = format!("{remote_ref}...HEAD");
        let out = run_git(
            &self.repo_dir,
            &["diff", "--name-only", "-z", "--diff-filter=ACM", &range],
        )?;
        Ok(parse_name_list(&out))
    }
}

impl ChangeSource for GitChangeSource {
    fn resolve(&self, context: &RunContext) -> Vec<ChangedFile> {
        let result = match context.mode {
            RunMode::Local => self.staged_files(),
            RunMode::ContinuousIntegration => {
                self.merge_base_files(context.base_ref_or_default())
            }
        };

        match result {
            Ok(files) => {
                debug!(count = files.len(), mode = ?context.mode, "resolved change set");
                files
            }
            Err(e) => {
                warn!(
                    event = "changes.unavailable",
                    mode = ?context.mode,
                    error = %e,
                    "could not resolve changed files; proceeding as if nothing changed \
                     (CI checkouts need history back to the merge-base, e.g. fetch-depth: 0)"
                );
                Vec::new()
            }
        }
    }
}

/// Number of line breaks in the file, or `None` if it cannot be read as text.
pub fn line_count(path: &Path) -> Option<usize> {
    std::fs::read_to_string(path)
        .ok()
        .map(|content| content.matches('\n').count())
}

/// Whether `path` is too large to analyse. Unreadable files count as
/// oversized so they are skipped rather than reviewed with partial content.
pub fn is_oversized(path: &Path, config: &ExecutionConfig) -> bool {
    match line_count(path) {
        Some(lines) => lines > config.max_lines_per_file,
        None => true,
    }
}

/// Absolute path of the work tree containing `dir`.
pub fn repo_root(dir: &Path) -> Result<PathBuf> {
    let out = run_git(dir, &["rev-parse", "--show-toplevel"])?;
    let root = out.trim();
    if root.is_empty() {
        return Err(BlastGuardError::GitError(
            "git rev-parse --show-toplevel returned empty output".to_string(),
        ));
    }
    Ok(PathBuf::from(root))
}

/// Check whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Write a `pre-commit` hook that runs `blastguard check`.
///
/// Refuses to replace a hook it did not write unless `force` is set.
/// Returns the path of the hook file.
pub fn install_pre_commit_hook(repo_dir: &Path, force: bool) -> Result<PathBuf> {
    let hooks = run_git(repo_dir, &["rev-parse", "--git-path", "hooks"])?;
    let hooks_dir = repo_dir.join(hooks.trim());
    std::fs::create_dir_all(&hooks_dir)?;

    let hook_path = hooks_dir.join("pre-commit");
    if hook_path.exists() && !force {
        let existing = std::fs::read_to_string(&hook_path).unwrap_or_default();
        if !existing.contains(HOOK_MARKER) {
            return Err(BlastGuardError::HookError(format!(
                "{} already exists and was not written by blastguard (use --force to replace it)",
                hook_path.display()
            )));
        }
    }

    let script = format!("#!/bin/sh\n{HOOK_MARKER}\nexec blastguard check \"$@\"\n");
    std::fs::write(&hook_path, script)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&hook_path, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(hook_path)
}

fn run_git(repo_dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .map_err(|e| BlastGuardError::GitError(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BlastGuardError::GitError(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn parse_name_list(raw: &str) -> Vec<ChangedFile> {
    raw.split('\0')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(ChangedFile::new)
        .collect()
}
