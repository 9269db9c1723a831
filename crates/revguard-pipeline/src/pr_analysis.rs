// crates/revguard-pipeline/src/pr_analysis.rs
// ============================================================================
// Module: Revguard PR Analysis Processor
// Description: End-to-end orchestration for a pull-request-triggered
//   analysis run (§4.5).
// Purpose: Drive lock acquisition, the cache check, the AI run, and report
//   posting in the fixed order the distilled spec requires, over the
//   capability traits rather than any concrete backend.
// Dependencies: revguard-core, revguard-diff
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use revguard_core::AiClient;
use revguard_core::AiRequest;
use revguard_core::AnalysisEvent;
use revguard_core::AnalysisLockedError;
use revguard_core::AnalysisStore;
use revguard_core::AnalysisType;
use revguard_core::CancellationToken;
use revguard_core::CodeAnalysis;
use revguard_core::CompletionOutcome;
use revguard_core::EventSink;
use revguard_core::FilePath;
use revguard_core::JobRecorder;
use revguard_core::LockError;
use revguard_core::LockKey;
use revguard_core::LockService;
use revguard_core::NewCodeAnalysis;
use revguard_core::PrAnalysisRequest;
use revguard_core::PrNumber;
use revguard_core::Project;
use revguard_core::RagOperations;
use revguard_core::StoreError;
use revguard_core::VcsOperations;
use revguard_core::job::TriggerSource;
use revguard_core::record_best_effort;
use revguard_diff::DiffParser;

use crate::error::PipelineError;
use crate::support::fresh_correlation_id;
use crate::support::unresolved_as_prior_issues;

/// Result of a successful `PrAnalysisProcessor` run.
#[derive(Debug, Clone)]
pub struct PrAnalysisOutcome {
    /// The analysis that was returned — either freshly created, or the
    /// cached ACCEPTED row for this `(project, commit, pr)` (Invariant
    /// CA-1).
    pub analysis: CodeAnalysis,
    /// Whether this run was served from the cache (step 4) rather than a
    /// fresh AI invocation.
    pub cached: bool,
}

/// Orchestrates a single pull-request analysis end to end (§4.5).
pub struct PrAnalysisProcessor {
    vcs: Arc<dyn VcsOperations>,
    ai: Arc<dyn AiClient>,
    rag: Arc<dyn RagOperations>,
    locks: Arc<dyn LockService>,
    store: Arc<dyn AnalysisStore>,
    jobs: Arc<dyn JobRecorder>,
    diff_parser: DiffParser,
    poll_interval: Duration,
    max_wait: Duration,
}

impl PrAnalysisProcessor {
    /// Builds a processor over the given capabilities. `poll_interval`/
    /// `max_wait` govern lock-wait polling (§4.1).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vcs: Arc<dyn VcsOperations>,
        ai: Arc<dyn AiClient>,
        rag: Arc<dyn RagOperations>,
        locks: Arc<dyn LockService>,
        store: Arc<dyn AnalysisStore>,
        jobs: Arc<dyn JobRecorder>,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Self {
        Self { vcs, ai, rag, locks, store, jobs, diff_parser: DiffParser::new(), poll_interval, max_wait }
    }

    /// Runs the pipeline for `request`, forwarding every event to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] per the surfaced failure modes in §4.5/§7:
    /// lock contention, VCS/AI/store failures, or cancellation.
    pub fn process(
        &self,
        request: &PrAnalysisRequest,
        trigger_source: TriggerSource,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<PrAnalysisOutcome, PipelineError> {
        let job_id = self.jobs.create_job(request.project_id, AnalysisType::PrAnalysis, trigger_source).ok();

        // Step 1: AnalysisStarted.
        let correlation_id = fresh_correlation_id();
        sink.accept(AnalysisEvent::AnalysisStarted { correlation_id, analysis_type: AnalysisType::PrAnalysis });

        match self.run(request, sink, cancel) {
            Ok(outcome) => {
                if let Some(job_id) = job_id {
                    record_best_effort(self.jobs.complete_job(job_id, Some("pr analysis succeeded")));
                }
                Ok(outcome)
            }
            Err(err) => {
                if let Some(job_id) = job_id {
                    record_best_effort(self.jobs.fail_job(job_id, &err.to_string()));
                }
                Err(err)
            }
        }
    }

    fn run(
        &self,
        request: &PrAnalysisRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<PrAnalysisOutcome, PipelineError> {
        if cancel.is_cancelled() {
            emit_completed_cancelled(sink);
            return Err(PipelineError::Cancelled);
        }

        let project = self
            .store
            .get_project(request.project_id)?
            .ok_or_else(|| PipelineError::Store(StoreError::NotFound(format!("project {}", request.project_id))))?;

        // Step 2: lock acquisition, unless the caller already holds one.
        let owned_lock_key = if request.pre_acquired_lock_key.is_some() {
            None
        } else {
            match self.locks.acquire_with_wait(
                request.project_id,
                &request.source_branch,
                AnalysisType::PrAnalysis,
                Some(&request.commit_hash),
                Some(request.pr_number),
                self.poll_interval,
                self.max_wait,
                sink,
                cancel,
            ) {
                Ok(Some(key)) => Some(key),
                Ok(None) => {
                    sink.accept(AnalysisEvent::Completed {
                        outcome: CompletionOutcome::Failed,
                        detail: Some("Lock acquisition timeout".to_string()),
                        issues_found: None,
                        files_analyzed: None,
                    });
                    return Err(PipelineError::Locked(AnalysisLockedError {
                        analysis_type: AnalysisType::PrAnalysis,
                        branch_name: request.source_branch.clone(),
                        project_id: request.project_id,
                    }));
                }
                Err(LockError::Cancelled) => {
                    emit_completed_cancelled(sink);
                    return Err(PipelineError::Cancelled);
                }
                Err(err) => return Err(PipelineError::Lock(err)),
            }
        };

        let result = self.run_locked(&project, request, sink, cancel);

        if let Some(lock_key) = owned_lock_key {
            record_best_effort_lock_release(&self.locks, &lock_key);
        }

        result
    }

    fn run_locked(
        &self,
        project: &Project,
        request: &PrAnalysisRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<PrAnalysisOutcome, PipelineError> {
        // Step 3: upsert PullRequest.
        let pull_request = self.store.upsert_pull_request(
            request.project_id,
            request.pr_number,
            &request.source_branch,
            &request.target_branch,
            &request.commit_hash,
        )?;

        // Step 4: cache check.
        if let Some(cached) =
            self.store.find_accepted_analysis(request.project_id, &request.commit_hash, Some(request.pr_number))?
        {
            best_effort_post_report(&self.vcs, project, &cached, Some(request.pr_number), request.placeholder_comment_id.as_deref(), sink, cancel);
            // A cache hit re-posts the prior result but does no new work: per
            // spec §8 S2, issuesFound/filesAnalyzed report this run's fresh
            // findings (zero), not the cached analysis's own issue count.
            sink.accept(AnalysisEvent::Completed {
                outcome: CompletionOutcome::Success,
                detail: None,
                issues_found: Some(0),
                files_analyzed: Some(0),
            });
            return Ok(PrAnalysisOutcome { analysis: cached, cached: true });
        }

        if project.ai_binding.is_none() {
            sink.accept(AnalysisEvent::Completed {
                outcome: CompletionOutcome::Failed,
                detail: Some("AI binding not configured".to_string()),
                issues_found: None,
                files_analyzed: None,
            });
            return Err(PipelineError::AiNotConfigured(project.id.get()));
        }

        if cancel.is_cancelled() {
            emit_completed_cancelled(sink);
            return Err(PipelineError::Cancelled);
        }

        // Step 5: prior analyses, newest-first; immediate predecessor for
        // incremental diff / resolution context.
        let prior_analyses = self.store.list_prior_analyses(request.project_id, request.pr_number)?;
        let prior_issues = prior_analyses.first().map(|analysis| unresolved_as_prior_issues(&analysis.issues)).unwrap_or_default();

        // Step 6: best-effort RAG freshness.
        if self.rag.is_enabled(project) {
            if let Err(err) = self.rag.ensure_index_up_to_date(project, &request.target_branch, sink, cancel) {
                sink.accept(AnalysisEvent::Warning { message: format!("RAG index refresh failed: {err}") });
            }
        }

        // Step 7: fetch diff, build and run the AI request.
        let raw_diff = self.vcs.get_pull_request_diff(project, request.pr_number, cancel)?;
        let changed_files: Vec<FilePath> = self.diff_parser.parse_changed_paths(&raw_diff).into_iter().map(FilePath::from).collect();

        let ai_request = AiRequest {
            project_id: request.project_id,
            target_branch: request.target_branch.clone(),
            source_branch: Some(request.source_branch.clone()),
            commit_hash: request.commit_hash.clone(),
            pr_number: Some(request.pr_number),
            changed_files: changed_files.clone(),
            raw_diff,
            prior_issues,
            prior_analysis_count: u32::try_from(prior_analyses.len()).unwrap_or(u32::MAX),
            analysis_type: AnalysisType::PrAnalysis,
        };

        let ai_result = match self.ai.analyze(&ai_request, sink, cancel) {
            Ok(result) => result,
            Err(err) => {
                sink.accept(AnalysisEvent::Completed {
                    outcome: CompletionOutcome::Failed,
                    detail: Some(err.to_string()),
                    issues_found: None,
                    files_analyzed: None,
                });
                return Err(PipelineError::Ai(err));
            }
        };

        // Step 8: persist.
        let analysis = self.store.create_analysis(NewCodeAnalysis {
            project_id: request.project_id,
            analysis_type: AnalysisType::PrAnalysis,
            pr_number: Some(request.pr_number),
            branch_name: request.target_branch.clone(),
            source_branch_name: Some(request.source_branch.clone()),
            commit_hash: request.commit_hash.clone(),
            pr_version: pull_request.pr_version,
            issues: ai_result.issues,
        })?;

        // Step 9: best-effort report posting.
        best_effort_post_report(&self.vcs, project, &analysis, Some(request.pr_number), request.placeholder_comment_id.as_deref(), sink, cancel);

        // Step 10: terminal event.
        sink.accept(AnalysisEvent::Completed {
            outcome: CompletionOutcome::Success,
            detail: None,
            issues_found: Some(u32::try_from(analysis.issues_found()).unwrap_or(u32::MAX)),
            files_analyzed: Some(u32::try_from(changed_files.len()).unwrap_or(u32::MAX)),
        });

        Ok(PrAnalysisOutcome { analysis, cached: false })
    }
}

fn emit_completed_cancelled(sink: &dyn EventSink) {
    sink.accept(AnalysisEvent::Completed {
        outcome: CompletionOutcome::Cancelled,
        detail: Some("cancelled".to_string()),
        issues_found: None,
        files_analyzed: None,
    });
}

fn best_effort_post_report(
    vcs: &Arc<dyn VcsOperations>,
    project: &Project,
    analysis: &CodeAnalysis,
    pr_number: Option<PrNumber>,
    placeholder_comment_id: Option<&str>,
    sink: &dyn EventSink,
    cancel: &CancellationToken,
) {
    if let Err(err) = vcs.post_analysis_report(project, analysis, pr_number, placeholder_comment_id, cancel) {
        sink.accept(AnalysisEvent::Warning { message: format!("failed to post analysis report: {err}") });
    }
}

fn record_best_effort_lock_release(locks: &Arc<dyn LockService>, lock_key: &LockKey) {
    let _ = locks.release(lock_key);
}
