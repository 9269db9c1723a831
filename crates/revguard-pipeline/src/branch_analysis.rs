// crates/revguard-pipeline/src/branch_analysis.rs
// ============================================================================
// Module: Revguard Branch Analysis Processor
// Description: End-to-end orchestration for a branch push/merge
//   reconciliation run (§4.6).
// Purpose: Re-map pre-existing findings onto the new commit, ask the AI
//   which of the candidates still apply, and trigger a best-effort
//   retrieval-index update, without ever touching the `CodeAnalysis` rows a
//   concurrent PR analysis for the same branch might be writing (§5:
//   disjoint lock types touch disjoint aggregates).
// Dependencies: revguard-core, revguard-diff
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use revguard_core::AiClient;
use revguard_core::AiRequest;
use revguard_core::AnalysisEvent;
use revguard_core::AnalysisLockedError;
use revguard_core::AnalysisStore;
use revguard_core::AnalysisType;
use revguard_core::Branch;
use revguard_core::BranchAnalysisRequest;
use revguard_core::BranchIssue;
use revguard_core::CancellationToken;
use revguard_core::CompletionOutcome;
use revguard_core::EventSink;
use revguard_core::FilePath;
use revguard_core::JobRecorder;
use revguard_core::LockError;
use revguard_core::LockKey;
use revguard_core::LockService;
use revguard_core::Project;
use revguard_core::RagOperations;
use revguard_core::StoreError;
use revguard_core::VcsOperations;
use revguard_core::job::TriggerSource;
use revguard_core::record_best_effort;
use revguard_diff::DiffParser;

use crate::error::PipelineError;
use crate::support::fresh_correlation_id;

/// Result of a successful `BranchAnalysisProcessor` run.
#[derive(Debug, Clone)]
pub struct BranchAnalysisOutcome {
    /// The branch aggregate after both counter-recompute passes (§4.6 steps
    /// 7 and 10).
    pub branch: Branch,
    /// Number of files the triggering diff touched.
    pub files_changed: usize,
    /// Number of candidate issues marked resolved by this run's targeted AI
    /// pass (0 if no candidates existed or none were decided resolved).
    pub issues_resolved: usize,
}

/// Orchestrates a single branch push/merge reconciliation end to end
/// (§4.6).
pub struct BranchAnalysisProcessor {
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

impl BranchAnalysisProcessor {
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
    /// Returns [`PipelineError`] per the surfaced failure modes in §4.6/§7:
    /// lock contention, VCS/AI/store failures, or cancellation.
    pub fn process(
        &self,
        request: &BranchAnalysisRequest,
        trigger_source: TriggerSource,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<BranchAnalysisOutcome, PipelineError> {
        let job_id = self.jobs.create_job(request.project_id, AnalysisType::BranchAnalysis, trigger_source).ok();

        let correlation_id = fresh_correlation_id();
        sink.accept(AnalysisEvent::AnalysisStarted { correlation_id, analysis_type: AnalysisType::BranchAnalysis });

        match self.run(request, sink, cancel) {
            Ok(outcome) => {
                if let Some(job_id) = job_id {
                    record_best_effort(self.jobs.complete_job(job_id, Some("branch reconciliation succeeded")));
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
        request: &BranchAnalysisRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<BranchAnalysisOutcome, PipelineError> {
        if cancel.is_cancelled() {
            emit_completed_cancelled(sink);
            return Err(PipelineError::Cancelled);
        }

        // Step 1: load project, acquire lock.
        let project = self
            .store
            .get_project(request.project_id)?
            .ok_or_else(|| PipelineError::Store(StoreError::NotFound(format!("project {}", request.project_id))))?;

        let lock_key = match self.locks.acquire_with_wait(
            request.project_id,
            &request.target_branch,
            AnalysisType::BranchAnalysis,
            Some(&request.commit_hash),
            request.source_pr_number,
            self.poll_interval,
            self.max_wait,
            sink,
            cancel,
        ) {
            Ok(Some(key)) => key,
            Ok(None) => {
                sink.accept(AnalysisEvent::Completed {
                    outcome: CompletionOutcome::Failed,
                    detail: Some("Lock acquisition timeout".to_string()),
                    issues_found: None,
                    files_analyzed: None,
                });
                return Err(PipelineError::Locked(AnalysisLockedError {
                    analysis_type: AnalysisType::BranchAnalysis,
                    branch_name: request.target_branch.clone(),
                    project_id: request.project_id,
                }));
            }
            Err(LockError::Cancelled) => {
                emit_completed_cancelled(sink);
                return Err(PipelineError::Cancelled);
            }
            Err(err) => return Err(PipelineError::Lock(err)),
        };

        let result = self.run_locked(&project, request, sink, cancel);
        record_best_effort_lock_release(&self.locks, &lock_key);
        result
    }

    fn run_locked(
        &self,
        project: &Project,
        request: &BranchAnalysisRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<BranchAnalysisOutcome, PipelineError> {
        // Step 2: fetch diff — PR diff when a merge PR is known (captures
        // all PR files even on a fast-forward merge commit), else commit
        // diff.
        let raw_diff = match request.source_pr_number {
            Some(pr_number) => self.vcs.get_pull_request_diff(project, pr_number, cancel)?,
            None => self.vcs.get_commit_diff(project, &request.commit_hash, cancel)?,
        };

        if cancel.is_cancelled() {
            emit_completed_cancelled(sink);
            return Err(PipelineError::Cancelled);
        }

        // Step 3: changed paths.
        let changed_files: Vec<FilePath> =
            self.diff_parser.parse_changed_paths(&raw_diff).into_iter().map(FilePath::from).collect();

        // Step 4: per-file existence check + BranchFile upsert. Files that
        // do not exist on the target branch (e.g. deleted in the merge, S5)
        // are excluded from every downstream step: no BranchFile row, no
        // BranchIssue mapping.
        let mut existing_files: Vec<FilePath> = Vec::with_capacity(changed_files.len());
        for file_path in &changed_files {
            if cancel.is_cancelled() {
                emit_completed_cancelled(sink);
                return Err(PipelineError::Cancelled);
            }
            let exists = match self.vcs.check_file_exists_in_branch(project, &request.target_branch, file_path, cancel) {
                Ok(exists) => exists,
                // Fail-open: an ambiguous existence probe keeps the file in
                // scope rather than silently dropping it (§4.6, §7).
                Err(err) => {
                    sink.accept(AnalysisEvent::Warning {
                        message: format!("file existence check failed for {}: {err}; treating as present", file_path.as_str()),
                    });
                    true
                }
            };
            if !exists {
                continue;
            }
            existing_files.push(file_path.clone());
            let qualifying = self.store.qualifying_issues_for_branch(
                request.project_id,
                &request.target_branch,
                std::slice::from_ref(file_path),
            )?;
            let unresolved_count = qualifying.iter().filter(|issue| !issue.resolved).count();
            self.store.upsert_branch_file(
                request.project_id,
                &request.target_branch,
                file_path,
                u32::try_from(unresolved_count).unwrap_or(u32::MAX),
            )?;
        }

        // Step 5: upsert the branch row itself.
        let mut branch = self.store.get_or_create_branch(request.project_id, &request.target_branch, &request.commit_hash)?;
        self.store.update_branch_commit(branch.id, &request.commit_hash)?;
        branch.commit_hash = request.commit_hash.clone();

        // Step 6: map every qualifying issue across the existing changed
        // files into a BranchIssue link, creating or updating severity as
        // needed.
        let qualifying_issues =
            self.store.qualifying_issues_for_branch(request.project_id, &request.target_branch, &existing_files)?;
        for issue in &qualifying_issues {
            self.store.upsert_branch_issue(branch.id, issue, None)?;
        }

        // Step 7: recompute and persist counters from the branch's current
        // issue set.
        let mut branch_issues = self.store.list_branch_issues(branch.id)?;
        branch.recompute_counters(&branch_issues);
        self.store.save_branch_counters(&branch)?;

        // Step 8: candidate set — unresolved BranchIssues whose file is
        // among the changed files this run touched.
        let changed_file_names: std::collections::BTreeSet<&str> =
            existing_files.iter().map(FilePath::as_str).collect();
        let candidates: Vec<BranchIssue> = branch_issues
            .iter()
            .filter(|issue| !issue.resolved && changed_file_names.contains(issue.file_path.as_str()))
            .cloned()
            .collect();

        let mut issues_resolved = 0usize;

        if !candidates.is_empty() && !cancel.is_cancelled() {
            // Step 9: targeted AI reconciliation pass over the candidate
            // set only.
            let prior_issues = candidates
                .iter()
                .map(|issue| revguard_core::AiPriorIssue {
                    issue_id: issue.code_analysis_issue_id,
                    file_path: issue.file_path.clone(),
                    line_number: None,
                    severity: issue.severity,
                    reason: String::new(),
                })
                .collect();

            let ai_request = AiRequest {
                project_id: request.project_id,
                target_branch: request.target_branch.clone(),
                source_branch: None,
                commit_hash: request.commit_hash.clone(),
                pr_number: request.source_pr_number,
                changed_files: existing_files.clone(),
                raw_diff: raw_diff.clone(),
                prior_issues,
                prior_analysis_count: 0,
                analysis_type: AnalysisType::BranchAnalysis,
            };

            match self.ai.reconcile(&ai_request, sink, cancel) {
                Ok(reconciliation) => {
                    let resolved_at = now_millis();
                    for decision in reconciliation.decisions {
                        if !decision.is_resolved {
                            continue;
                        }
                        let Some(branch_issue) =
                            candidates.iter().find(|issue| issue.code_analysis_issue_id == decision.issue_id)
                        else {
                            continue;
                        };
                        self.store.resolve_branch_issue_by_commit(branch_issue.id, &request.commit_hash, resolved_at)?;
                        issues_resolved += 1;
                    }
                }
                Err(err) => {
                    sink.accept(AnalysisEvent::Warning { message: format!("reconciliation pass failed: {err}") });
                }
            }
        }

        // Step 10: recompute counters again, persist; set default branch if
        // unset.
        branch_issues = self.store.list_branch_issues(branch.id)?;
        branch.recompute_counters(&branch_issues);
        self.store.save_branch_counters(&branch)?;
        self.store.set_default_branch_if_unset(request.project_id, &request.target_branch)?;

        // Step 11: best-effort retrieval-index update.
        if self.rag.is_enabled(project) {
            if let Err(err) =
                self.rag.trigger_incremental_update(project, &request.target_branch, &request.commit_hash, &raw_diff, sink, cancel)
            {
                sink.accept(AnalysisEvent::Warning { message: format!("RAG incremental update failed: {err}") });
            }
        }

        sink.accept(AnalysisEvent::Completed {
            outcome: CompletionOutcome::Success,
            detail: None,
            issues_found: Some(u32::try_from(branch.counters.total_issues).unwrap_or(u32::MAX)),
            files_analyzed: Some(u32::try_from(changed_files.len()).unwrap_or(u32::MAX)),
        });

        Ok(BranchAnalysisOutcome { branch, files_changed: changed_files.len(), issues_resolved })
    }
}

/// Current time as Unix-millis, saturating rather than overflowing or
/// panicking (mirrors `revguard-store-sqlite`'s private helper of the same
/// shape).
fn now_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|duration| i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)).unwrap_or(0)
}

fn emit_completed_cancelled(sink: &dyn EventSink) {
    sink.accept(AnalysisEvent::Completed {
        outcome: CompletionOutcome::Cancelled,
        detail: Some("cancelled".to_string()),
        issues_found: None,
        files_analyzed: None,
    });
}

fn record_best_effort_lock_release(locks: &Arc<dyn LockService>, lock_key: &LockKey) {
    let _ = locks.release(lock_key);
}
