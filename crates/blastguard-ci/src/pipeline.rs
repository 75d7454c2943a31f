//! Run controller: one gate run from change set to `RunResult`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use blastguard_core::metrics::METRICS;
use blastguard_core::obs;
use blastguard_core::{
    aggregate, blast_radius, is_oversized, AnalysisRequest, Assessment, ChangeSource,
    ChangedFile, CircuitBreaker, DependencyGraphAdapter, ExclusionFilter, ExecutionConfig,
    RunContext, RunResult, SkipReason, SkippedFile, VerdictEntry,
};
use blastguard_llm::InferenceClient;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::runner::{PlannedReview, VerdictRunner};

/// Result of a complete gate run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Identifier attached to every log line of the run.
    pub run_id: String,

    pub result: RunResult,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl PipelineResult {
    pub fn blocked(&self) -> bool {
        self.result.blocked()
    }

    /// Number of files that got a well-formed verdict.
    pub fn assessed_count(&self) -> usize {
        self.result.verdicts().filter(|e| !e.is_failed()).count()
    }

    /// Number of files whose analysis failed.
    pub fn failed_count(&self) -> usize {
        self.result.verdicts().filter(|e| e.is_failed()).count()
    }
}

/// The gate, wired to its collaborators.
pub struct GatePipeline {
    root: PathBuf,
    config: ExecutionConfig,
    changes: Arc<dyn ChangeSource>,
    graph: DependencyGraphAdapter,
    client: Arc<dyn InferenceClient>,
}

impl GatePipeline {
    pub fn new(
        root: impl Into<PathBuf>,
        config: ExecutionConfig,
        changes: Arc<dyn ChangeSource>,
        graph: DependencyGraphAdapter,
        client: Arc<dyn InferenceClient>,
    ) -> Self {
        Self {
            root: root.into(),
            config,
            changes,
            graph,
            client,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Execute one run.
    ///
    /// Short-circuits, in order, on: no analysable files, the circuit
    /// breaker, and nothing left after size filtering. Neither an
    /// unavailable change set nor an unavailable graph aborts the run.
    pub async fn run(&self, context: &RunContext) -> anyhow::Result<PipelineResult> {
        let run_id = Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);
        self.run_inner(run_id, context).instrument(span).await
    }

    async fn run_inner(&self, run_id: String, context: &RunContext) -> anyhow::Result<PipelineResult> {
        let start = Instant::now();

        let changes = Arc::clone(&self.changes);
        let resolve_ctx = context.clone();
        let changed = tokio::task::spawn_blocking(move || changes.resolve(&resolve_ctx))
            .await
            .context("change-set resolution task panicked")?;
        obs::emit_run_started(&run_id, context.mode, changed.len());

        let filter = ExclusionFilter::new(&self.config).context("building exclusion filter")?;
        let filtered = filter.partition(changed);
        for skip in &filtered.excluded {
            obs::emit_file_skipped(&skip.path, &skip.reason);
        }
        let mut skipped = filtered.excluded;

        let result = if filtered.kept.is_empty() {
            info!(run_id = %run_id, "no analysable files changed");
            RunResult::no_relevant_files(skipped)
        } else if CircuitBreaker::new(&self.config).should_skip_run(&filtered.kept) {
            obs::emit_run_skipped(&run_id, filtered.kept.len(), self.config.max_files);
            RunResult::skipped(filtered.kept.len(), self.config.max_files)
        } else {
            let assessments = self.review(filtered.kept, &mut skipped).await;
            aggregate(assessments, skipped)
        };

        METRICS.add_files_skipped(result.skipped.len() as u64);
        let duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_run_finished(&run_id, duration_ms, result.assessments.len(), result.blocked());
        METRICS.flush();

        Ok(PipelineResult {
            run_id,
            result,
            duration_ms,
        })
    }

    /// Size filter, graph, blast radius and verdicts for the files that
    /// survived the breaker. Appends every file it drops to `skipped`.
    async fn review(&self, files: Vec<ChangedFile>, skipped: &mut Vec<SkippedFile>) -> Vec<Assessment> {
        let mut analysable = Vec::with_capacity(files.len());
        for file in files {
            if is_oversized(&self.root.join(&file.path), &self.config) {
                let reason = SkipReason::Oversized {
                    max_lines: self.config.max_lines_per_file,
                };
                obs::emit_file_skipped(&file.path, &reason);
                skipped.push(SkippedFile::new(file.path, reason));
            } else {
                analysable.push(file);
            }
        }
        if analysable.is_empty() {
            return Vec::new();
        }

        let graph = match self.graph.build_graph(&self.root, &self.config).await {
            Ok(graph) => graph,
            Err(_) => {
                for file in analysable {
                    obs::emit_file_skipped(&file.path, &SkipReason::GraphUnavailable);
                    skipped.push(SkippedFile::new(file.path, SkipReason::GraphUnavailable));
                }
                return Vec::new();
            }
        };

        let mut plans = Vec::new();
        for file in &analysable {
            let radius = blast_radius(file, &graph, &self.root, &self.config);
            obs::emit_radius_computed(&file.path, radius.dependents.len(), radius.truncated);
            if radius.truncated {
                METRICS.inc_dependents_truncated();
            }
            METRICS.add_dependents_dropped(radius.oversized_dependents.len() as u64);
            for dependent in &radius.oversized_dependents {
                let reason = SkipReason::OversizedDependent {
                    changed: file.path.clone(),
                    max_lines: self.config.max_lines_per_file,
                };
                obs::emit_file_skipped(dependent, &reason);
                skipped.push(SkippedFile::new(dependent.clone(), reason));
            }
            if radius.is_empty() {
                obs::emit_file_skipped(&file.path, &SkipReason::NoDependents);
                skipped.push(SkippedFile::new(file.path.clone(), SkipReason::NoDependents));
                continue;
            }

            let plan = match AnalysisRequest::build(&radius, &self.root) {
                Ok(request) => PlannedReview::Request { radius, request },
                Err(e) => {
                    METRICS.inc_analysis_failures();
                    let entry = VerdictEntry::AnalysisFailed {
                        file: file.path.clone(),
                        cause: format!("could not read sources: {e}"),
                    };
                    obs::emit_entry_recorded(&entry, "");
                    PlannedReview::Settled(Assessment::new(radius, entry))
                }
            };
            plans.push(plan);
        }

        VerdictRunner::new(Arc::clone(&self.client), self.config.concurrency)
            .run(plans)
            .await
    }
}
