//! Change sets read from a saved unified diff (`git diff > change.diff`).
//!
//! Lets `check` run without a checkout's index or remote refs, e.g. on a
//! patch attached to a ticket. Same contract as the git source: added,
//! copied and modified files in diff order, deletions left out, and an
//! unreadable diff yields no changes.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::change::{ChangedFile, RunContext};
use crate::domain::error::Result;
use crate::git::ChangeSource;

/// `ChangeSource` backed by a diff file on disk.
#[derive(Debug, Clone)]
pub struct DiffFileChangeSource {
    path: PathBuf,
}

impl DiffFileChangeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Vec<ChangedFile>> {
        let text = std::fs::read_to_string(&self.path)?;
        Ok(parse_unified_diff(&text))
    }
}

impl ChangeSource for DiffFileChangeSource {
    fn resolve(&self, _context: &RunContext) -> Vec<ChangedFile> {
        match self.read() {
            Ok(files) => {
                debug!(count = files.len(), diff = %self.path.display(), "resolved change set from diff file");
                files
            }
            Err(e) => {
                warn!(
                    event = "changes.unavailable",
                    diff = %self.path.display(),
                    error = %e,
                    "could not read diff file; proceeding as if nothing changed"
                );
                Vec::new()
            }
        }
    }
}

#[derive(Default)]
struct FileBlock {
    path: Option<String>,
    deleted: bool,
    saw_new_header: bool,
}

/// Files touched by a unified diff, git-style or plain `---`/`+++`.
///
/// Hunk bodies are skipped by their line counts, so removed lines that
/// happen to start with `--` are never taken for headers.
pub fn parse_unified_diff(text: &str) -> Vec<ChangedFile> {
    let mut files: Vec<ChangedFile> = Vec::new();
    let mut block: Option<FileBlock> = None;
    let (mut old_left, mut new_left) = (0usize, 0usize);

    for line in text.lines() {
        if old_left > 0 || new_left > 0 {
            match line.chars().next() {
                Some(' ') | None => {
                    old_left = old_left.saturating_sub(1);
                    new_left = new_left.saturating_sub(1);
                    continue;
                }
                Some('-') => {
                    old_left = old_left.saturating_sub(1);
                    continue;
                }
                Some('+') => {
                    new_left = new_left.saturating_sub(1);
                    continue;
                }
                Some('\\') => continue,
                // Truncated hunk: fall through to header parsing.
                Some(_) => {
                    old_left = 0;
                    new_left = 0;
                }
            }
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            finish(block.take(), &mut files);
            block = Some(FileBlock {
                path: git_header_path(rest),
                ..FileBlock::default()
            });
        } else if line.starts_with("deleted file mode") {
            if let Some(b) = block.as_mut() {
                b.deleted = true;
            }
        } else if line.starts_with("--- ") {
            if block.as_ref().map_or(true, |b| b.saw_new_header) {
                finish(block.take(), &mut files);
                block = Some(FileBlock::default());
            }
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            let b = block.get_or_insert_with(FileBlock::default);
            b.saw_new_header = true;
            match header_path(rest) {
                Some(path) => b.path = Some(path),
                None => b.deleted = true,
            }
        } else if line.starts_with("@@") {
            if let Some((old, new)) = hunk_counts(line) {
                old_left = old;
                new_left = new;
            }
        }
    }
    finish(block.take(), &mut files);
    files
}

fn finish(block: Option<FileBlock>, files: &mut Vec<ChangedFile>) {
    if let Some(FileBlock {
        path: Some(path),
        deleted: false,
        ..
    }) = block
    {
        if !files.iter().any(|f| f.path == path) {
            files.push(ChangedFile::new(path));
        }
    }
}

/// `a/src/x.ts b/src/x.ts` -> `src/x.ts` (the post-image side).
fn git_header_path(rest: &str) -> Option<String> {
    let idx = rest.rfind(" b/")?;
    let path = &rest[idx + 3..];
    (!path.is_empty()).then(|| path.to_string())
}

/// Path from a `+++` header, `None` for `/dev/null`.
fn header_path(rest: &str) -> Option<String> {
    // Plain diffs append a tab and a timestamp.
    let raw = rest.split('\t').next().unwrap_or(rest).trim_end();
    if raw == "/dev/null" {
        return None;
    }
    let path = raw.strip_prefix("b/").unwrap_or(raw);
    (!path.is_empty()).then(|| path.to_string())
}

/// `@@ -12,5 +12,7 @@ fn x` -> `(5, 7)`. A missing count means one line.
fn hunk_counts(line: &str) -> Option<(usize, usize)> {
    let mut parts = line.split_whitespace().skip(1);
    let old = parts.next()?.strip_prefix('-')?;
    let new = parts.next()?.strip_prefix('+')?;
    let count = |range: &str| -> Option<usize> {
        match range.split_once(',') {
            Some((_, n)) => n.parse().ok(),
            None => Some(1),
        }
    };
    Some((count(old)?, count(new)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIT_DIFF: &str = "\
diff --git a/src/utils.ts b/src/utils.ts
index 3b18e51..a4c2d10 100644
--- a/src/utils.ts
+++ b/src/utils.ts
@@ -1,3 +1,3 @@
 export const fmt = (n: number) =>
--- a removed line that looks like a header
+++ an added line that looks like a header
   n.toFixed(2);
diff --git a/src/legacy.ts b/src/legacy.ts
deleted file mode 100644
index 1111111..0000000
--- a/src/legacy.ts
+++ /dev/null
@@ -1 +0,0 @@
-export {};
diff --git a/src/new.tsx b/src/new.tsx
new file mode 100644
index 0000000..2222222
--- /dev/null
+++ b/src/new.tsx
@@ -0,0 +1 @@
+export const New = () => null;
";

    fn paths(files: &[ChangedFile]) -> Vec<&str> {
        files.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn test_git_diff_skips_deletions() {
        let files = parse_unified_diff(GIT_DIFF);
        assert_eq!(paths(&files), vec!["src/utils.ts", "src/new.tsx"]);
    }

    #[test]
    fn test_plain_unified_diff() {
        let diff = "\
--- src/cart.ts\t2024-05-01 10:00:00
+++ src/cart.ts\t2024-05-01 10:05:00
@@ -2 +2 @@
-const a = 1;
+const a = 2;
--- lib/old.js\t2024-05-01 10:00:00
+++ /dev/null\t2024-05-01 10:05:00
@@ -1 +0,0 @@
-gone();
";
        assert_eq!(paths(&parse_unified_diff(diff)), vec!["src/cart.ts"]);
    }

    #[test]
    fn test_binary_and_rename_use_git_header() {
        let diff = "\
diff --git a/assets/logo.png b/assets/logo.png
index 1111111..2222222 100644
Binary files a/assets/logo.png and b/assets/logo.png differ
diff --git a/src/a.ts b/src/b.ts
similarity index 100%
rename from src/a.ts
rename to src/b.ts
";
        assert_eq!(
            paths(&parse_unified_diff(diff)),
            vec!["assets/logo.png", "src/b.ts"]
        );
    }

    #[test]
    fn test_empty_diff() {
        assert!(parse_unified_diff("").is_empty());
    }

    #[test]
    fn test_missing_file_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let source = DiffFileChangeSource::new(dir.path().join("missing.diff"));
        assert!(source.read().is_err());
        assert!(source.resolve(&RunContext::local()).is_empty());
    }

    #[test]
    fn test_reads_diff_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("change.diff");
        std::fs::write(&path, GIT_DIFF).unwrap();
        let files = DiffFileChangeSource::new(&path).resolve(&RunContext::ci(None));
        assert_eq!(paths(&files), vec!["src/utils.ts", "src/new.tsx"]);
    }
}
