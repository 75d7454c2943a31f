//! Risk aggregation and the human-readable report.

use std::fmt::Write as _;

use serde::Serialize;

use crate::domain::error::Result;
use crate::domain::skip::SkippedFile;
use crate::domain::verdict::{Verdict, VerdictEntry};
use crate::graph::BlastRadius;

/// One reviewed file: the context it was shown with and what came back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub radius: BlastRadius,
    pub entry: VerdictEntry,
}

impl Assessment {
    pub fn new(radius: BlastRadius, entry: VerdictEntry) -> Self {
        Self { radius, entry }
    }
}

/// How far a run got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Circuit breaker tripped. Nothing was reviewed.
    Skipped { changed_files: usize, max_files: usize },
    /// No analysable code in the change set.
    NoRelevantFiles,
    /// Files went through blast-radius mapping and, where they had
    /// dependents, verdict requests.
    Reviewed,
}

/// Terminal artifact of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub outcome: RunOutcome,
    /// In changed-file order.
    pub assessments: Vec<Assessment>,
    pub skipped: Vec<SkippedFile>,
    pub report: String,
}

impl RunResult {
    /// Circuit-breaker result: un-reviewed, not approved.
    pub fn skipped(changed_files: usize, max_files: usize) -> Self {
        let outcome = RunOutcome::Skipped {
            changed_files,
            max_files,
        };
        Self::finish(outcome, Vec::new(), Vec::new())
    }

    pub fn no_relevant_files(skipped: Vec<SkippedFile>) -> Self {
        Self::finish(RunOutcome::NoRelevantFiles, Vec::new(), skipped)
    }

    fn finish(outcome: RunOutcome, assessments: Vec<Assessment>, skipped: Vec<SkippedFile>) -> Self {
        let mut result = Self {
            outcome,
            assessments,
            skipped,
            report: String::new(),
        };
        result.report = render_report(&result);
        result
    }

    /// True iff some verdict rejects the change or rates it critical.
    pub fn blocked(&self) -> bool {
        self.verdicts().any(VerdictEntry::blocks)
    }

    pub fn verdicts(&self) -> impl Iterator<Item = &VerdictEntry> {
        self.assessments.iter().map(|a| &a.entry)
    }

    pub fn blocking(&self) -> impl Iterator<Item = (&Assessment, &Verdict)> {
        self.assessments.iter().filter_map(|a| match &a.entry {
            VerdictEntry::Assessed(v) if v.blocks() => Some((a, v)),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.verdicts().filter_map(|entry| match entry {
            VerdictEntry::AnalysisFailed { file, cause } => Some((file.as_str(), cause.as_str())),
            VerdictEntry::Assessed(_) => None,
        })
    }

    /// Machine-readable form for `check --json`.
    pub fn to_json(&self) -> Result<String> {
        let view = RunResultView {
            outcome: &self.outcome,
            blocked: self.blocked(),
            verdicts: self
                .assessments
                .iter()
                .map(|a| VerdictView {
                    entry: &a.entry,
                    dependents: &a.radius.dependents,
                    truncated: a.radius.truncated,
                    oversized_dependents: &a.radius.oversized_dependents,
                })
                .collect(),
            skipped: &self.skipped,
            report: &self.report,
        };
        Ok(serde_json::to_string_pretty(&view)?)
    }
}

#[derive(Serialize)]
struct VerdictView<'a> {
    #[serde(flatten)]
    entry: &'a VerdictEntry,
    dependents: &'a [String],
    truncated: bool,
    oversized_dependents: &'a [String],
}

#[derive(Serialize)]
struct RunResultView<'a> {
    outcome: &'a RunOutcome,
    blocked: bool,
    verdicts: Vec<VerdictView<'a>>,
    skipped: &'a [SkippedFile],
    report: &'a str,
}

/// Fold per-file results into the run result. `assessments` must already be
/// in changed-file order.
pub fn aggregate(assessments: Vec<Assessment>, skipped: Vec<SkippedFile>) -> RunResult {
    RunResult::finish(RunOutcome::Reviewed, assessments, skipped)
}

fn render_report(result: &RunResult) -> String {
    let mut out = String::new();

    match &result.outcome {
        RunOutcome::Skipped {
            changed_files,
            max_files,
        } => {
            let _ = writeln!(out, "## BlastGuard: skipped (massive change)\n");
            let _ = writeln!(
                out,
                "{changed_files} code files changed, over the limit of {max_files}. \
                 This change was **not reviewed**; treat it as unverified, not approved."
            );
            return out;
        }
        RunOutcome::NoRelevantFiles => {
            let _ = writeln!(out, "## BlastGuard: no code files changed\n");
            let _ = writeln!(out, "Nothing in this change is subject to review.");
        }
        RunOutcome::Reviewed => {
            let blocking: Vec<_> = result.blocking().collect();
            if blocking.is_empty() {
                let _ = writeln!(out, "## BlastGuard: no blocking risk found\n");
                let reviewed = result.verdicts().filter(|e| !e.is_failed()).count();
                let _ = writeln!(out, "{reviewed} file(s) reviewed against their dependents.");
            } else {
                let _ = writeln!(out, "## BlastGuard: change blocked\n");
                for (assessment, verdict) in blocking {
                    let _ = writeln!(out, "### `{}`\n", verdict.file);
                    let _ = writeln!(
                        out,
                        "- **Verdict:** {:?} / {:?} risk",
                        verdict.outcome, verdict.risk
                    );
                    let dependents = assessment
                        .radius
                        .dependents
                        .iter()
                        .map(|d| format!("`{d}`"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    let _ = writeln!(out, "- **Breaks:** {dependents}");
                    let _ = writeln!(out, "- **Reason:** {}\n", verdict.reason);
                }
            }
        }
    }

    let failures: Vec<_> = result.failures().collect();
    let truncated: Vec<_> = result
        .assessments
        .iter()
        .filter(|a| a.radius.truncated)
        .collect();
    if failures.is_empty() && truncated.is_empty() && result.skipped.is_empty() {
        return out;
    }

    let _ = writeln!(out, "\n### Not reviewed\n");
    for (file, cause) in failures {
        let _ = writeln!(out, "- `{file}`: analysis failed ({cause})");
    }
    for assessment in truncated {
        let _ = writeln!(
            out,
            "- `{}`: only {} dependent(s) shown, others were not checked",
            assessment.radius.changed_file.path,
            assessment.radius.dependents.len()
        );
    }
    for skip in &result.skipped {
        let _ = writeln!(out, "- `{}`: {}", skip.path, skip.reason);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::change::ChangedFile;
    use crate::domain::skip::SkipReason;
    use crate::domain::verdict::{Outcome, Risk};

    fn assessed(file: &str, dependents: &[&str], outcome: Outcome, risk: Risk) -> Assessment {
        Assessment::new(
            BlastRadius {
                changed_file: ChangedFile::new(file),
                dependents: dependents.iter().map(|d| d.to_string()).collect(),
                truncated: false,
                oversized_dependents: Vec::new(),
            },
            VerdictEntry::Assessed(Verdict {
                file: file.to_string(),
                outcome,
                risk,
                reason: format!("reason for {file}"),
            }),
        )
    }

    fn failed(file: &str) -> Assessment {
        Assessment::new(
            BlastRadius {
                changed_file: ChangedFile::new(file),
                dependents: vec!["dep.ts".into()],
                truncated: false,
                oversized_dependents: Vec::new(),
            },
            VerdictEntry::AnalysisFailed {
                file: file.to_string(),
                cause: "timed out".into(),
            },
        )
    }

    #[test]
    fn test_blocked_by_rejection_or_critical() {
        let rejected_low = aggregate(
            vec![assessed("a.ts", &["b.ts"], Outcome::Rejected, Risk::Low)],
            vec![],
        );
        assert!(rejected_low.blocked());

        let approved_critical = aggregate(
            vec![assessed("a.ts", &["b.ts"], Outcome::Approved, Risk::Critical)],
            vec![],
        );
        assert!(approved_critical.blocked());

        let approved_low = aggregate(
            vec![assessed("a.ts", &["b.ts"], Outcome::Approved, Risk::Low)],
            vec![],
        );
        assert!(!approved_low.blocked());
    }

    #[test]
    fn test_failures_never_block() {
        let result = aggregate(vec![failed("a.ts"), failed("b.ts")], vec![]);
        assert!(!result.blocked());
        assert!(result.report.contains("### Not reviewed"));
        assert!(result.report.contains("`a.ts`: analysis failed (timed out)"));
    }

    #[test]
    fn test_report_lists_only_blocked_entries() {
        let result = aggregate(
            vec![
                assessed("src/utils.ts", &["src/billing.ts"], Outcome::Rejected, Risk::Critical),
                assessed("src/cart.ts", &["src/checkout.ts"], Outcome::Approved, Risk::Low),
            ],
            vec![SkippedFile::new("src/lonely.ts", SkipReason::NoDependents)],
        );
        let report = &result.report;
        assert!(report.contains("change blocked"));
        assert!(report.contains("### `src/utils.ts`"));
        assert!(report.contains("`src/billing.ts`"));
        assert!(report.contains("reason for src/utils.ts"));
        assert!(!report.contains("src/cart.ts"));
        assert!(report.contains("`src/lonely.ts`: no dependents found"));
    }

    #[test]
    fn test_truncation_surfaced() {
        let mut a = assessed("a.ts", &["b.ts", "c.ts"], Outcome::Approved, Risk::Low);
        a.radius.truncated = true;
        let result = aggregate(vec![a], vec![]);
        assert!(result.report.contains("only 2 dependent(s) shown"));
    }

    #[test]
    fn test_oversized_dependent_listed_as_not_reviewed() {
        let mut a = assessed("src/utils.ts", &["src/small.ts"], Outcome::Approved, Risk::Low);
        a.radius.oversized_dependents = vec!["src/big.ts".into()];
        let skip = SkippedFile::new(
            "src/big.ts",
            SkipReason::OversizedDependent {
                changed: "src/utils.ts".into(),
                max_lines: 400,
            },
        );
        let result = aggregate(vec![a], vec![skip]);
        assert!(!result.blocked());
        assert!(result.report.contains("### Not reviewed"));
        assert!(result
            .report
            .contains("- `src/big.ts`: dependent of `src/utils.ts` over 400 lines or unreadable"));
    }

    #[test]
    fn test_skipped_run_is_not_approval() {
        let result = RunResult::skipped(20, 15);
        assert!(!result.blocked());
        assert_eq!(
            result.outcome,
            RunOutcome::Skipped {
                changed_files: 20,
                max_files: 15
            }
        );
        assert!(result.report.contains("massive change"));
        assert!(result.report.contains("not reviewed"));
    }

    #[test]
    fn test_json_view() {
        let result = aggregate(
            vec![assessed("a.ts", &["b.ts"], Outcome::Rejected, Risk::Critical)],
            vec![],
        );
        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["blocked"], true);
        assert_eq!(json["outcome"]["kind"], "reviewed");
        assert_eq!(json["verdicts"][0]["status"], "assessed");
        assert_eq!(json["verdicts"][0]["outcome"], "REJECTED");
        assert_eq!(json["verdicts"][0]["dependents"][0], "b.ts");
    }
}
