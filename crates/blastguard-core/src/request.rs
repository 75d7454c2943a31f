//! Verdict request construction.
//!
//! One [`AnalysisRequest`] per changed file that has dependents. The prompt
//! is fully determined by the file contents on disk, so identical trees
//! produce byte-identical requests and identical fingerprints.

use std::path::Path;

use blastguard_llm::InferencePrompt;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::error::{BlastGuardError, Result};
use crate::graph::BlastRadius;

const SYSTEM_INSTRUCTIONS: &str = "\
You are a senior software engineer reviewing a change before it is merged.
You are given one MODIFIED FILE and the DEPENDENT FILES that import it.
Decide whether the modification breaks the logic, types or runtime behaviour \
of any dependent file. Ignore style, naming and formatting.
Mark the change REJECTED only when a dependent would break. Mark risk CRITICAL \
when a break would reach production behaviour; otherwise LOW.";

const OUTPUT_DIRECTIVE: &str = "\
Respond with a single JSON object and nothing else. It must have exactly these fields:
  \"outcome\": \"APPROVED\" or \"REJECTED\"
  \"risk\": \"LOW\" or \"CRITICAL\"
  \"reason\": one or two sentences naming the affected dependent and why";

/// A source file as shown to the reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSection {
    pub role: SourceRole,
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    Modified,
    Dependent,
}

impl SourceRole {
    fn label(self) -> &'static str {
        match self {
            SourceRole::Modified => "MODIFIED FILE",
            SourceRole::Dependent => "DEPENDENT FILE",
        }
    }
}

/// Everything needed to ask for one file's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub file: String,
    pub sections: Vec<SourceSection>,
    pub system: String,
    pub user: String,
    /// Hex SHA-256 over the rendered system and user text.
    pub fingerprint: String,
}

impl AnalysisRequest {
    /// Read the changed file and its dependents from `root` and render the
    /// prompt. Callers only build requests for non-empty radii; an empty one
    /// is rejected.
    pub fn build(radius: &BlastRadius, root: &Path) -> Result<Self> {
        if radius.is_empty() {
            return Err(BlastGuardError::EmptyBlastRadius(
                radius.changed_file.path.clone(),
            ));
        }

        let mut sections = Vec::with_capacity(radius.dependents.len() + 1);
        sections.push(read_section(root, SourceRole::Modified, &radius.changed_file.path)?);
        for dependent in &radius.dependents {
            sections.push(read_section(root, SourceRole::Dependent, dependent)?);
        }

        Ok(Self::from_sections(radius.changed_file.path.clone(), sections))
    }

    /// Render a request from already-loaded sections.
    pub fn from_sections(file: String, sections: Vec<SourceSection>) -> Self {
        let system = SYSTEM_INSTRUCTIONS.to_string();
        let user = render_user(&sections);
        let fingerprint = fingerprint(&system, &user);
        Self {
            file,
            sections,
            system,
            user,
            fingerprint,
        }
    }

    /// Paths of the dependent sections, in prompt order.
    pub fn dependents(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .filter(|s| s.role == SourceRole::Dependent)
            .map(|s| s.path.as_str())
    }

    pub fn to_prompt(&self) -> InferencePrompt {
        InferencePrompt::new(self.file.clone(), self.system.clone(), self.user.clone())
    }
}

fn read_section(root: &Path, role: SourceRole, path: &str) -> Result<SourceSection> {
    let content = std::fs::read_to_string(root.join(path))?;
    Ok(SourceSection {
        role,
        path: path.to_string(),
        content,
    })
}

fn render_user(sections: &[SourceSection]) -> String {
    let mut out = String::new();
    for section in sections {
        out.push_str(&format!(
            "### {}: {}\n```\n{}",
            section.role.label(),
            section.path,
            section.content
        ));
        if !section.content.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("```\n\n");
    }
    out.push_str(OUTPUT_DIRECTIVE);
    out.push('\n');
    out
}

fn fingerprint(system: &str, user: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(system.as_bytes());
    hasher.update([0u8]);
    hasher.update(user.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::change::ChangedFile;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join("src/utils.ts"),
            "export const price = (n: number) => n.toFixed(2);\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("src/billing.ts"),
            "import { price } from './utils';\nexport const total = price(3);",
        )
        .unwrap();
        dir
    }

    fn radius() -> BlastRadius {
        BlastRadius {
            changed_file: ChangedFile::new("src/utils.ts"),
            dependents: vec!["src/billing.ts".to_string()],
            truncated: false,
            oversized_dependents: Vec::new(),
        }
    }

    #[test]
    fn test_build_labels_roles_and_paths() {
        let dir = tree();
        let request = AnalysisRequest::build(&radius(), dir.path()).unwrap();

        assert_eq!(request.file, "src/utils.ts");
        assert_eq!(request.dependents().collect::<Vec<_>>(), vec!["src/billing.ts"]);
        let modified = request.user.find("### MODIFIED FILE: src/utils.ts").unwrap();
        let dependent = request.user.find("### DEPENDENT FILE: src/billing.ts").unwrap();
        assert!(modified < dependent);
        assert!(request.user.contains("price(3);\n```"));
        assert!(request.user.ends_with("why\n"));
        for field in ["\"outcome\"", "\"risk\"", "\"reason\""] {
            assert!(request.user.contains(field));
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let dir = tree();
        let a = AnalysisRequest::build(&radius(), dir.path()).unwrap();
        let b = AnalysisRequest::build(&radius(), dir.path()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint.len(), 64);

        std::fs::write(dir.path().join("src/utils.ts"), "export {};\n").unwrap();
        let c = AnalysisRequest::build(&radius(), dir.path()).unwrap();
        assert_ne!(a.fingerprint, c.fingerprint);
    }

    #[test]
    fn test_build_rejects_empty_radius() {
        let dir = tree();
        let empty = BlastRadius::empty(ChangedFile::new("src/utils.ts"));
        let err = AnalysisRequest::build(&empty, dir.path()).unwrap_err();
        assert!(matches!(err, BlastGuardError::EmptyBlastRadius(ref path) if path == "src/utils.ts"));
    }

    #[test]
    fn test_build_missing_dependent_is_io_error() {
        let dir = tree();
        let mut radius = radius();
        radius.dependents.push("src/gone.ts".to_string());
        let err = AnalysisRequest::build(&radius, dir.path()).unwrap_err();
        assert!(matches!(err, BlastGuardError::Io(_)));
    }

    #[test]
    fn test_prompt_subject_is_file() {
        let dir = tree();
        let prompt = AnalysisRequest::build(&radius(), dir.path())
            .unwrap()
            .to_prompt();
        assert_eq!(prompt.subject, "src/utils.ts");
        assert!(prompt.system.contains("DEPENDENT FILES"));
    }
}
