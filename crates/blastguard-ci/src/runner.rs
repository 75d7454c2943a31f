//! Verdict execution with bounded concurrency.

use std::sync::Arc;

use blastguard_core::metrics::METRICS;
use blastguard_core::obs;
use blastguard_core::{interpret_response, AnalysisRequest, Assessment, BlastRadius};
use blastguard_llm::InferenceClient;
use futures::stream::{self, StreamExt};
use tracing::debug;

/// One file's place in the review queue.
#[derive(Debug, Clone)]
pub enum PlannedReview {
    /// Ask the inference service.
    Request {
        radius: BlastRadius,
        request: AnalysisRequest,
    },
    /// Already settled before any call (e.g. its sources could not be read).
    Settled(Assessment),
}

impl PlannedReview {
    pub fn file(&self) -> &str {
        match self {
            PlannedReview::Request { radius, .. } => &radius.changed_file.path,
            PlannedReview::Settled(a) => &a.radius.changed_file.path,
        }
    }
}

/// Issues verdict requests, at most `concurrency` in flight.
pub struct VerdictRunner {
    client: Arc<dyn InferenceClient>,
    concurrency: usize,
}

impl VerdictRunner {
    pub fn new(client: Arc<dyn InferenceClient>, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    /// Run every planned review. The output is in input order no matter
    /// which call finishes first, and one file's failure never affects
    /// another's.
    pub async fn run(&self, plans: Vec<PlannedReview>) -> Vec<Assessment> {
        stream::iter(plans)
            .map(|plan| async move {
                match plan {
                    PlannedReview::Settled(assessment) => assessment,
                    PlannedReview::Request { radius, request } => {
                        self.assess(radius, request).await
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn assess(&self, radius: BlastRadius, request: AnalysisRequest) -> Assessment {
        debug!(
            file = %request.file,
            model = %self.client.model(),
            fingerprint = %request.fingerprint,
            "requesting verdict"
        );
        METRICS.inc_inference_calls();
        let response = self.client.complete(&request.to_prompt()).await;
        let entry = interpret_response(&request.file, response);
        if entry.is_failed() {
            METRICS.inc_analysis_failures();
        }
        obs::emit_entry_recorded(&entry, &request.fingerprint);
        Assessment::new(radius, entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blastguard_core::request::{SourceRole, SourceSection};
    use blastguard_core::{ChangedFile, VerdictEntry};
    use blastguard_llm::fakes::ScriptedClient;
    use blastguard_llm::InferenceError;

    const REJECT: &str = r#"{"outcome":"REJECTED","risk":"CRITICAL","reason":"breaks"}"#;
    const APPROVE: &str = r#"{"outcome":"APPROVED","risk":"LOW","reason":"fine"}"#;

    fn planned(file: &str) -> PlannedReview {
        let radius = BlastRadius {
            changed_file: ChangedFile::new(file),
            dependents: vec!["dep.ts".to_string()],
            truncated: false,
            oversized_dependents: Vec::new(),
        };
        let request = AnalysisRequest::from_sections(
            file.to_string(),
            vec![
                SourceSection {
                    role: SourceRole::Modified,
                    path: file.to_string(),
                    content: "export {};\n".to_string(),
                },
                SourceSection {
                    role: SourceRole::Dependent,
                    path: "dep.ts".to_string(),
                    content: "import './x';\n".to_string(),
                },
            ],
        );
        PlannedReview::Request { radius, request }
    }

    #[tokio::test]
    async fn test_order_preserved_with_concurrency() {
        let client = Arc::new(ScriptedClient::always(APPROVE).when("b.ts", REJECT));
        let runner = VerdictRunner::new(client.clone(), 4);

        let out = runner
            .run(vec![planned("a.ts"), planned("b.ts"), planned("c.ts")])
            .await;

        let files: Vec<&str> = out.iter().map(|a| a.entry.file()).collect();
        assert_eq!(files, vec!["a.ts", "b.ts", "c.ts"]);
        assert!(out[1].entry.blocks());
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_failure_isolated() {
        let client = Arc::new(
            ScriptedClient::always(APPROVE).fail_when("a.ts", InferenceError::Timeout { secs: 1 }),
        );
        let runner = VerdictRunner::new(client, 1);
        let out = runner.run(vec![planned("a.ts"), planned("b.ts")]).await;

        assert!(out[0].entry.is_failed());
        assert!(matches!(out[1].entry, VerdictEntry::Assessed(_)));
    }

    #[tokio::test]
    async fn test_settled_entries_skip_the_client() {
        let client = Arc::new(ScriptedClient::always(APPROVE));
        let runner = VerdictRunner::new(client.clone(), 0);
        let settled = Assessment::new(
            BlastRadius::empty(ChangedFile::new("gone.ts")),
            VerdictEntry::AnalysisFailed {
                file: "gone.ts".into(),
                cause: "unreadable".into(),
            },
        );

        let out = runner
            .run(vec![PlannedReview::Settled(settled.clone()), planned("b.ts")])
            .await;
        assert_eq!(out[0], settled);
        assert_eq!(client.calls(), 1);
    }
}
