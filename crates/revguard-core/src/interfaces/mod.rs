// crates/revguard-core/src/interfaces/mod.rs
// ============================================================================
// Module: Revguard Interfaces
// Description: Backend-agnostic capability traits the orchestration core
//   depends on: version control, AI analysis, retrieval indexing, advisory
//   locking, persistence, and audit recording.
// Purpose: Define the contract surfaces so concrete implementations (HTTP
//   clients, SQLite stores) can be swapped without touching pipeline logic.
// Dependencies: crate::entities, crate::identifiers, crate::job, crate::events
// ============================================================================

//! ## Overview
//! Every external collaborator the pipelines depend on is expressed as a
//! trait here, mirroring the donor's own `interfaces/mod.rs`: one file, one
//! section per capability, the trait and its error enum declared together so
//! implementation crates (`revguard-vcs`, `revguard-ai`, `revguard-rag`,
//! `revguard-store-sqlite`) depend on this crate without this crate ever
//! depending on them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::cancellation::CancellationToken;
use crate::entities::AnalysisType;
use crate::entities::Branch;
use crate::entities::BranchFile;
use crate::entities::BranchIssue;
use crate::entities::CodeAnalysis;
use crate::entities::CodeAnalysisIssue;
use crate::entities::Project;
use crate::entities::PullRequest;
use crate::entities::Severity;
use crate::events::EventSink;
use crate::identifiers::BranchId;
use crate::identifiers::BranchName;
use crate::identifiers::CodeAnalysisIssueId;
use crate::identifiers::CommitHash;
use crate::identifiers::FilePath;
use crate::identifiers::JobId;
use crate::identifiers::LockKey;
use crate::identifiers::PrNumber;
use crate::identifiers::ProjectId;

// ============================================================================
// SECTION: VcsOperations
// ============================================================================

/// Outcome of posting (or updating) an analysis report on the VCS provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostReportOutcome {
    /// Provider-assigned comment id, created or updated.
    pub comment_id: String,
}

/// Errors surfaced by a `VcsOperations` implementation.
///
/// # Invariants
/// - `RateLimited` is an internal retry signal produced by the retry loop
///   inside the implementation; it is never returned to a caller of this
///   trait — the loop either succeeds or exhausts its attempts and returns
///   one of the other variants.
#[derive(Debug, Error)]
pub enum VcsError {
    /// The provider responded with a rate-limit status; carries the
    /// implementation's computed backoff and attempt count. Internal-only.
    #[error("rate limited, retry after {retry_after:?} (attempt {attempt})")]
    RateLimited {
        /// Duration to wait before retrying.
        retry_after: Duration,
        /// Attempt number that was rate limited (1-based).
        attempt: u8,
    },
    /// The provider responded with a non-2xx, non-429 status.
    #[error("VCS provider returned HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Provider-supplied error message, or a generic description.
        message: String,
    },
    /// A transport-level failure (DNS, TLS, connection reset, timeout).
    #[error("VCS transport failure: {0}")]
    Transport(String),
    /// The operation observed cancellation before completing.
    #[error("VCS operation cancelled")]
    Cancelled,
}

/// Provider-agnostic capability the core depends on for all version-control
/// I/O. Implemented per variant of [`crate::entities::VcsProvider`] by
/// `revguard-vcs`; the core never imports a provider SDK directly.
pub trait VcsOperations: Send + Sync {
    /// Fetches the full unified diff for a pull request (all files in the
    /// PR, not just the head commit).
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] on transport failure, a non-2xx response after
    /// retries, or cancellation.
    fn get_pull_request_diff(
        &self,
        project: &Project,
        pr_number: PrNumber,
        cancel: &CancellationToken,
    ) -> Result<String, VcsError>;

    /// Fetches the unified diff for a single commit.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] on transport failure, a non-2xx response after
    /// retries, or cancellation.
    fn get_commit_diff(
        &self,
        project: &Project,
        commit_hash: &CommitHash,
        cancel: &CancellationToken,
    ) -> Result<String, VcsError>;

    /// Checks whether `file_path` exists at the tip of `branch_name`. Must
    /// retry on HTTP 429 with exponential backoff (initial 2s, doubling),
    /// honouring `Retry-After` when present, up to 3 attempts; 404 is a
    /// successful `false`, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when the provider returns a non-2xx,
    /// non-404 status after retries are exhausted, or on transport failure
    /// or cancellation.
    fn check_file_exists_in_branch(
        &self,
        project: &Project,
        branch_name: &BranchName,
        file_path: &FilePath,
        cancel: &CancellationToken,
    ) -> Result<bool, VcsError>;

    /// Posts (or updates, if `placeholder_comment_id` is set) an analysis
    /// report comment on the provider.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] on transport failure, a non-2xx response after
    /// retries, or cancellation.
    fn post_analysis_report(
        &self,
        project: &Project,
        analysis: &CodeAnalysis,
        pr_number: Option<PrNumber>,
        placeholder_comment_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<PostReportOutcome, VcsError>;
}

// ============================================================================
// SECTION: AiClient
// ============================================================================

/// One prior issue surfaced to the AI for incremental-diff and resolution
/// context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiPriorIssue {
    /// Authoritative issue identifier.
    pub issue_id: CodeAnalysisIssueId,
    /// File path of the prior finding.
    pub file_path: FilePath,
    /// Line number of the prior finding, if known.
    pub line_number: Option<u32>,
    /// Severity of the prior finding.
    pub severity: Severity,
    /// Reason text of the prior finding.
    pub reason: String,
}

/// Fixed-shape request payload consumed by the AI service (§4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiRequest {
    /// Project identifier.
    pub project_id: ProjectId,
    /// Target branch.
    pub target_branch: BranchName,
    /// Source branch, for PR-triggered runs.
    pub source_branch: Option<BranchName>,
    /// Commit hash being analyzed.
    pub commit_hash: CommitHash,
    /// PR number, nullable for branch runs.
    pub pr_number: Option<PrNumber>,
    /// Files touched by this change.
    pub changed_files: Vec<FilePath>,
    /// Full unified diff text.
    pub raw_diff: String,
    /// Prior issues relevant to this run (incremental diffing / resolution
    /// detection context).
    pub prior_issues: Vec<AiPriorIssue>,
    /// Count of prior analyses considered.
    pub prior_analysis_count: u32,
    /// Which pipeline is driving this request.
    pub analysis_type: AnalysisType,
}

/// One finding returned by a full analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiFinding {
    /// Stable issue id, when the AI assigns one (absent for brand-new
    /// findings, which the store assigns an id to on persistence).
    pub issue_id: Option<CodeAnalysisIssueId>,
    /// File path of the finding.
    pub file_path: FilePath,
    /// Line number, if known.
    pub line_number: Option<u32>,
    /// Severity.
    pub severity: Severity,
    /// Human-readable reason.
    pub reason: String,
    /// Suggested fix, if any.
    pub suggested_fix_description: Option<String>,
}

/// Terminal result of a full analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AiFindingsResult {
    /// Findings, normalized to a deterministically ordered list regardless
    /// of whether the wire `result` event carried a list or a keyed map
    /// (§9 design note: "Issues field polymorphism"). Sorted by
    /// `(file_path, line_number, issue_id)` by the implementation before
    /// this value is constructed.
    pub issues: Vec<AiFinding>,
    /// Optional free-text summary comment to include in the posted report.
    pub comment: Option<String>,
}

/// Per-issue resolution decision returned by a targeted branch
/// reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiResolutionDecision {
    /// Which issue this decision applies to.
    pub issue_id: CodeAnalysisIssueId,
    /// Whether the AI judged the issue resolved.
    pub is_resolved: bool,
}

/// Terminal result of a targeted branch reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AiReconciliationResult {
    /// Resolution decisions, normalized the same way as
    /// [`AiFindingsResult::issues`]. Decisions whose `issueId` could not be
    /// parsed as an integer are dropped by the implementation before this
    /// value is constructed (§4.6 edge cases).
    pub decisions: Vec<AiResolutionDecision>,
}

/// Errors surfaced by an `AiClient` implementation.
#[derive(Debug, Error)]
pub enum AiClientError {
    /// Transport-level failure reaching the AI service.
    #[error("AI transport failure: {0}")]
    Transport(String),
    /// The AI service responded with a non-2xx status.
    #[error("AI service returned HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or generic description.
        message: String,
    },
    /// The stream carried an `error` event (§4.4: forwarded, then the
    /// pipeline enters its failure branch).
    #[error("AI service reported an error: {0}")]
    StreamError(String),
    /// The stream closed without a terminal `result` or `error` event.
    #[error("AI stream ended without a terminal event")]
    ProtocolFailure,
    /// The operation observed cancellation before completing.
    #[error("AI operation cancelled")]
    Cancelled,
}

/// Capability the core depends on to drive the AI service. Implemented by
/// `revguard-ai`, which owns the ndjson wire protocol entirely; this trait
/// only exposes the normalized request/result shapes.
pub trait AiClient: Send + Sync {
    /// Runs a full analysis over `request`, forwarding every stream event to
    /// `sink` as it arrives.
    ///
    /// # Errors
    ///
    /// Returns [`AiClientError`] on transport failure, a non-2xx response, a
    /// stream `error` event, a stream that ends without a terminal event, or
    /// cancellation.
    fn analyze(
        &self,
        request: &AiRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<AiFindingsResult, AiClientError>;

    /// Runs a targeted reconciliation pass over `request` (whose
    /// `prior_issues` carries only the branch's current unresolved
    /// candidates), forwarding every stream event to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`AiClientError`] under the same conditions as [`Self::analyze`].
    fn reconcile(
        &self,
        request: &AiRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<AiReconciliationResult, AiClientError>;
}

// ============================================================================
// SECTION: RagOperations
// ============================================================================

/// Errors surfaced by a `RagOperations` implementation. Per the propagation
/// policy, every call site treats this as best-effort: caught, turned into a
/// `warning` event, never bubbled as a pipeline failure.
#[derive(Debug, Error)]
pub enum RagError {
    /// Transport-level failure reaching the indexer.
    #[error("RAG transport failure: {0}")]
    Transport(String),
    /// The indexer responded with a non-2xx status.
    #[error("RAG indexer returned HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or generic description.
        message: String,
    },
    /// The operation observed cancellation before completing.
    #[error("RAG operation cancelled")]
    Cancelled,
}

/// Thin capability interface to the external retrieval indexer. Only the
/// rich variant that actually parses the diff into added/modified/deleted
/// sets is implemented in this workspace (§9: the trivial no-op variant is
/// deprecated and not ported).
pub trait RagOperations: Send + Sync {
    /// Returns whether the retrieval indexer feature is enabled for this
    /// project.
    fn is_enabled(&self, project: &Project) -> bool;

    /// Returns whether the indexer is ready to serve/accept updates for this
    /// project.
    ///
    /// # Errors
    ///
    /// Returns [`RagError`] on transport failure or cancellation.
    fn is_ready(&self, project: &Project, cancel: &CancellationToken) -> Result<bool, RagError>;

    /// Ensures the retrieval index for `branch` reflects the branch's
    /// current tip before an AI run consults it. Best-effort; failures never
    /// abort the calling pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RagError`] on transport failure or cancellation; callers
    /// treat any `Err` as a no-op.
    fn ensure_index_up_to_date(
        &self,
        project: &Project,
        branch: &BranchName,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<(), RagError>;

    /// Triggers an incremental index update for `branch` at `commit_hash`,
    /// parsing the triggering diff into added/modified/deleted sets and
    /// calling the indexer per set. Best-effort; failures never abort the
    /// calling pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RagError`] on transport failure or cancellation; callers
    /// treat any `Err` as a no-op.
    fn trigger_incremental_update(
        &self,
        project: &Project,
        branch: &BranchName,
        commit_hash: &CommitHash,
        raw_diff: &str,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<(), RagError>;
}

// ============================================================================
// SECTION: LockService
// ============================================================================

/// Result of a single, non-blocking acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquireOutcome {
    /// The lock key, valid whether or not acquisition succeeded (callers use
    /// it to correlate retries).
    pub lock_key: LockKey,
    /// Whether this call acquired the lock.
    pub acquired: bool,
}

/// Errors surfaced by a `LockService` implementation, distinct from the
/// contention outcome (which is represented by `acquired: false` /
/// `None`, not an error).
#[derive(Debug, Error)]
pub enum LockError {
    /// The backing store failed to execute the acquisition/release
    /// statement.
    #[error("lock store failure: {0}")]
    Store(String),
    /// The wait operation observed cancellation before a result was
    /// determined.
    #[error("lock wait cancelled")]
    Cancelled,
}

/// Advisory, expiring, blocking-with-timeout lock service keyed by
/// `(project, branch, type)`.
///
/// # Invariants
/// - At most one unexpired lock exists for a given key tuple (Invariant
///   L-1); acquisition is a conditional insert, never a pre-read-then-insert
///   (no TOCTOU).
pub trait LockService: Send + Sync {
    /// Attempts a single, non-blocking acquisition.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] on a store failure.
    fn acquire(
        &self,
        project_id: ProjectId,
        branch: &BranchName,
        analysis_type: AnalysisType,
        commit_hash: Option<&CommitHash>,
        pr_number: Option<PrNumber>,
    ) -> Result<AcquireOutcome, LockError>;

    /// Same as [`Self::acquire`], but on contention polls every
    /// `poll_interval` for up to `max_wait`, emitting `LockWaiting` events
    /// through `sink` on each retry. Returns `None` after the wait window
    /// elapses without acquiring.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] on a store failure or cancellation.
    fn acquire_with_wait(
        &self,
        project_id: ProjectId,
        branch: &BranchName,
        analysis_type: AnalysisType,
        commit_hash: Option<&CommitHash>,
        pr_number: Option<PrNumber>,
        poll_interval: Duration,
        max_wait: Duration,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<Option<LockKey>, LockError>;

    /// Releases a lock by key. Idempotent: releasing an already-released or
    /// unknown key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] on a store failure; callers treat this as
    /// best-effort (expiration cleans up).
    fn release(&self, lock_key: &LockKey) -> Result<(), LockError>;

    /// Deletes all rows with `expires_at < now`. Must run at least once per
    /// TTL; the caller is responsible for scheduling invocation.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] on a store failure.
    fn sweep_expired(&self) -> Result<u64, LockError>;
}

/// Raised by a pipeline when lock acquisition does not succeed within the
/// wait window (§4.1, §7: `LockContention`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not acquire {analysis_type:?} lock for project {project_id} branch {branch_name}")]
pub struct AnalysisLockedError {
    /// Which analysis type's lock was contended.
    pub analysis_type: AnalysisType,
    /// Branch the lock was scoped to.
    pub branch_name: BranchName,
    /// Project the lock was scoped to.
    pub project_id: ProjectId,
}

// ============================================================================
// SECTION: AnalysisStore
// ============================================================================

/// Fields needed to persist a brand-new `CodeAnalysis` run together with its
/// owned issues, in one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCodeAnalysis {
    /// Owning project.
    pub project_id: ProjectId,
    /// Which pipeline produced this run.
    pub analysis_type: AnalysisType,
    /// PR number, for PR runs.
    pub pr_number: Option<PrNumber>,
    /// Branch this run targets.
    pub branch_name: BranchName,
    /// Source branch, for PR runs.
    pub source_branch_name: Option<BranchName>,
    /// Commit analyzed.
    pub commit_hash: CommitHash,
    /// PR version this run corresponds to.
    pub pr_version: u32,
    /// Findings to persist as owned `CodeAnalysisIssue` rows.
    pub issues: Vec<AiFinding>,
}

/// Errors surfaced by an `AnalysisStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing database rejected or failed to execute a statement.
    #[error("store failure: {0}")]
    Backend(String),
    /// A row expected to exist (by identifier or unique key) was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Persistence capability over the full data model (§3). Implemented by
/// `revguard-store-sqlite`.
pub trait AnalysisStore: Send + Sync {
    /// Loads a project by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a backend failure.
    fn get_project(&self, project_id: ProjectId) -> Result<Option<Project>, StoreError>;

    /// Creates or updates the `PullRequest` row for `(project_id,
    /// pr_number)`, bumping `pr_version` when the commit hash changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a backend failure.
    fn upsert_pull_request(
        &self,
        project_id: ProjectId,
        pr_number: PrNumber,
        source_branch_name: &BranchName,
        target_branch_name: &BranchName,
        commit_hash: &CommitHash,
    ) -> Result<PullRequest, StoreError>;

    /// Looks up an ACCEPTED `CodeAnalysis` for the cache key `(project_id,
    /// commit_hash, pr_number)` (Invariant CA-1).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a backend failure.
    fn find_accepted_analysis(
        &self,
        project_id: ProjectId,
        commit_hash: &CommitHash,
        pr_number: Option<PrNumber>,
    ) -> Result<Option<CodeAnalysis>, StoreError>;

    /// Lists prior `CodeAnalysis` runs for a PR, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a backend failure.
    fn list_prior_analyses(
        &self,
        project_id: ProjectId,
        pr_number: PrNumber,
    ) -> Result<Vec<CodeAnalysis>, StoreError>;

    /// Persists a new, ACCEPTED `CodeAnalysis` run with its owned issues in
    /// one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a backend failure.
    fn create_analysis(&self, new_analysis: NewCodeAnalysis) -> Result<CodeAnalysis, StoreError>;

    /// Loads the branch for `(project_id, branch_name)`, creating it lazily
    /// with the given commit hash if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a backend failure.
    fn get_or_create_branch(
        &self,
        project_id: ProjectId,
        branch_name: &BranchName,
        commit_hash: &CommitHash,
    ) -> Result<Branch, StoreError>;

    /// Updates `commit_hash` on an existing branch row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a backend failure.
    fn update_branch_commit(
        &self,
        branch_id: BranchId,
        commit_hash: &CommitHash,
    ) -> Result<(), StoreError>;

    /// Persists the branch's current counters (after a caller-side
    /// [`Branch::recompute_counters`] call).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a backend failure.
    fn save_branch_counters(&self, branch: &Branch) -> Result<(), StoreError>;

    /// Sets the project's `default_branch`, only if it is currently unset.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a backend failure.
    fn set_default_branch_if_unset(
        &self,
        project_id: ProjectId,
        branch_name: &BranchName,
    ) -> Result<(), StoreError>;

    /// Creates or updates the `issue_count` for `(project_id, branch_name,
    /// file_path)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a backend failure.
    fn upsert_branch_file(
        &self,
        project_id: ProjectId,
        branch_name: &BranchName,
        file_path: &FilePath,
        issue_count: u32,
    ) -> Result<BranchFile, StoreError>;

    /// Returns every `CodeAnalysisIssue` whose owning analysis targets
    /// `branch_name` (either as `branch_name` or `source_branch_name`,
    /// preserved verbatim per §9's open question) and whose `file_path` is
    /// one of `file_paths`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a backend failure.
    fn qualifying_issues_for_branch(
        &self,
        project_id: ProjectId,
        branch_name: &BranchName,
        file_paths: &[FilePath],
    ) -> Result<Vec<CodeAnalysisIssue>, StoreError>;

    /// Creates the `BranchIssue` link for `code_analysis_issue_id` on
    /// `branch_id` if absent, or updates its severity if present (Invariant
    /// BI-1), preserving `first_detected_pr_number`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a backend failure.
    fn upsert_branch_issue(
        &self,
        branch_id: BranchId,
        issue: &CodeAnalysisIssue,
        first_detected_pr_number: Option<PrNumber>,
    ) -> Result<BranchIssue, StoreError>;

    /// Lists every `BranchIssue` owned by `branch_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a backend failure.
    fn list_branch_issues(&self, branch_id: BranchId) -> Result<Vec<BranchIssue>, StoreError>;

    /// In one transaction: marks `branch_issue_id` resolved with commit
    /// attribution, and flips the linked `CodeAnalysisIssue.resolved`
    /// (Invariant BI-2; §4.6 step 9).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a backend failure.
    fn resolve_branch_issue_by_commit(
        &self,
        branch_issue_id: crate::identifiers::BranchIssueId,
        commit_hash: &CommitHash,
        resolved_at: i64,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: JobRecorder
// ============================================================================

/// Errors surfaced by a `JobRecorder` implementation. Every call site treats
/// this as best-effort: caught at the call site and silently dropped, never
/// a second failure to handle.
#[derive(Debug, Error)]
pub enum JobRecorderError {
    /// The backing store failed to execute the audit write.
    #[error("job recorder failure: {0}")]
    Backend(String),
}

/// Audit-only append log of job lifecycle (§4.8). This trait IS this
/// workspace's logging layer: the donor workspace carries no
/// `tracing`/`log` dependency and denies `print_stdout`/`print_stderr`
/// outright, so structured records written to the store are the only
/// faithful rendition of "logging" here.
pub trait JobRecorder: Send + Sync {
    /// Creates a new job record for `project_id`/`analysis_type`.
    ///
    /// # Errors
    ///
    /// Returns [`JobRecorderError`] on a backend failure.
    fn create_job(
        &self,
        project_id: ProjectId,
        analysis_type: AnalysisType,
        trigger_source: crate::job::TriggerSource,
    ) -> Result<JobId, JobRecorderError>;

    /// Appends an INFO entry.
    ///
    /// # Errors
    ///
    /// Returns [`JobRecorderError`] on a backend failure.
    fn info(&self, job_id: JobId, stage: &str, message: &str) -> Result<(), JobRecorderError>;

    /// Appends a WARN entry.
    ///
    /// # Errors
    ///
    /// Returns [`JobRecorderError`] on a backend failure.
    fn warn(&self, job_id: JobId, stage: &str, message: &str) -> Result<(), JobRecorderError>;

    /// Appends an ERROR entry.
    ///
    /// # Errors
    ///
    /// Returns [`JobRecorderError`] on a backend failure.
    fn error(&self, job_id: JobId, stage: &str, message: &str) -> Result<(), JobRecorderError>;

    /// Marks the job succeeded, with an optional free-text summary.
    ///
    /// # Errors
    ///
    /// Returns [`JobRecorderError`] on a backend failure.
    fn complete_job(&self, job_id: JobId, summary: Option<&str>) -> Result<(), JobRecorderError>;

    /// Marks the job failed, with a free-text reason.
    ///
    /// # Errors
    ///
    /// Returns [`JobRecorderError`] on a backend failure.
    fn fail_job(&self, job_id: JobId, reason: &str) -> Result<(), JobRecorderError>;
}

/// Calls a best-effort `JobRecorder` method and silently drops any error, per
/// the "writes are best-effort" propagation policy (§7). Centralising the
/// drop here keeps call sites from repeating `let _ =` at every stage
/// transition.
pub fn record_best_effort<T>(result: Result<T, JobRecorderError>) {
    drop(result);
}
