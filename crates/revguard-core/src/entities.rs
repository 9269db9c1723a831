// crates/revguard-core/src/entities.rs
// ============================================================================
// Module: Revguard Entities
// Description: Aggregate roots and detail rows of the analysis data model.
// Purpose: Model `Project`, `Branch`, `PullRequest`, `CodeAnalysis` and their
//   owned detail rows with the invariants the store must uphold.
// Dependencies: crate::identifiers, serde
// ============================================================================

//! ## Overview
//! Ownership follows "the aggregate root exclusively owns its details":
//! `Branch` owns `BranchIssue` rows, `CodeAnalysis` owns `CodeAnalysisIssue`
//! rows. Cross-aggregate references (`CodeAnalysisIssueId` inside a
//! `BranchIssue`) are identifier pointers, never embedded copies.
//!
//! The aggregate counters on `Branch` (Invariant B-1) are recomputed from the
//! owned issue list in a single transaction on every mutation rather than
//! maintained by incremental deltas — see [`Branch::recompute_counters`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::BranchFileId;
use crate::identifiers::BranchId;
use crate::identifiers::BranchIssueId;
use crate::identifiers::BranchName;
use crate::identifiers::CodeAnalysisId;
use crate::identifiers::CodeAnalysisIssueId;
use crate::identifiers::CommitHash;
use crate::identifiers::FilePath;
use crate::identifiers::PrNumber;
use crate::identifiers::ProjectId;
use crate::identifiers::PullRequestId;

// ============================================================================
// SECTION: Shared Enums
// ============================================================================

/// Which of the two top-level pipelines produced or targets a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisType {
    /// Triggered by a pull-request event.
    PrAnalysis,
    /// Triggered by a push/merge to a tracked branch.
    BranchAnalysis,
    /// Internal lock type used only by the retrieval indexer; never produces
    /// a `CodeAnalysis` row.
    RagIndexing,
}

/// Lifecycle status of a `CodeAnalysis` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStatus {
    /// Row created, AI run not yet started.
    Pending,
    /// AI stream in progress.
    Running,
    /// AI stream terminated with a `result` event; issues persisted.
    Accepted,
    /// AI stream terminated with an `error` event, or transport/protocol
    /// failure.
    Failed,
}

/// Severity of a finding, ordered from least to most urgent for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Informational note; no action implied.
    Info,
    /// Minor issue.
    Low,
    /// Issue worth addressing before merge.
    Medium,
    /// Issue that should block merge.
    High,
}

/// Branch health derived from recent analysis outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    /// No health signal recorded yet.
    #[default]
    Unknown,
    /// Recent analyses have succeeded.
    Healthy,
    /// Consecutive analysis failures exceed the configured threshold.
    Stale,
}

// ============================================================================
// SECTION: Project
// ============================================================================

/// A tracked repository/workspace binding. Created externally (by the setup
/// wizard, out of scope for this crate); the orchestration core only reads
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project identifier.
    pub id: ProjectId,
    /// Human-readable project name.
    pub name: String,
    /// VCS namespace (organization/group) the project's repository lives
    /// under.
    pub namespace: String,
    /// Opaque workspace reference, scoping the project within a tenant.
    pub workspace_ref: String,
    /// The single effective VCS connection for this project. There is no
    /// legacy-binding fallback in this workspace: this field is the only
    /// accessor, per the resolution recorded in `DESIGN.md`.
    pub vcs_connection: VcsConnection,
    /// Optional AI service binding; `None` disables analysis entirely.
    pub ai_binding: Option<AiBinding>,
    /// Default branch name, set lazily on first successful branch analysis
    /// (§4.6 step 10).
    pub default_branch: Option<BranchName>,
    /// Feature configuration.
    pub config: ProjectConfig,
}

impl Project {
    /// Returns the project's single effective VCS connection.
    #[must_use]
    pub const fn effective_vcs_connection(&self) -> &VcsConnection {
        &self.vcs_connection
    }
}

/// Tagged union over the supported VCS providers (§9 design note:
/// "Polymorphism over providers").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VcsProvider {
    /// GitHub, authenticated via a GitHub App installation.
    Github,
    /// GitLab, authenticated via OAuth.
    Gitlab,
    /// Bitbucket Cloud.
    BitbucketCloud,
}

/// A resolved, ready-to-use VCS connection: provider tag plus the repository
/// coordinates `VcsOperations` needs. Credential material itself is held by
/// the `VcsClientProvider` capability (out of scope), not by this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsConnection {
    /// Which provider this connection targets.
    pub provider: VcsProvider,
    /// Workspace/organization slug on the provider.
    pub workspace: String,
    /// Repository slug within the workspace.
    pub repo_slug: String,
}

/// Binding to an AI service deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiBinding {
    /// Base URL of the AI service (e.g. `https://ai.internal.example`).
    pub base_url: String,
    /// Whether this project should prefer a locally-hosted MCP tool surface
    /// over the remote AI service when both are available.
    pub use_local_mcp: bool,
}

/// Feature toggles and sub-configuration owned by a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Whether PR-triggered analysis is enabled for this project.
    pub pr_analysis_enabled: bool,
    /// Whether branch-reconciliation analysis is enabled for this project.
    pub branch_analysis_enabled: bool,
    /// Retrieval-index configuration.
    pub rag_config: RagConfig,
    /// Comment-command configuration (e.g. `/revguard re-review`), consumed
    /// by the out-of-scope HTTP adapter; carried here only because it is
    /// part of the project aggregate.
    pub comment_commands_config: CommentCommandsConfig,
}

/// Retrieval-index feature configuration for a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagConfig {
    /// Whether the retrieval indexer is enabled for this project.
    pub enabled: bool,
    /// Base URL of the retrieval indexer service.
    pub base_url: Option<String>,
}

/// Comment-command feature configuration for a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CommentCommandsConfig {
    /// Whether slash-command comments are recognized on this project's pull
    /// requests.
    pub enabled: bool,
    /// Command prefix, e.g. `/revguard`.
    pub prefix: String,
}

// ============================================================================
// SECTION: Branch
// ============================================================================

/// Aggregate counters maintained on a `Branch`, recomputed as a unit.
///
/// # Invariants
/// - `total_issues == count(issues where !resolved)` (Invariant B-1).
/// - Each severity counter equals the count of unresolved issues of that
///   severity.
/// - `resolved_count == count(issues where resolved)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BranchCounters {
    /// Count of unresolved issues across all severities.
    pub total_issues: u32,
    /// Count of unresolved HIGH severity issues.
    pub high_severity_count: u32,
    /// Count of unresolved MEDIUM severity issues.
    pub medium_severity_count: u32,
    /// Count of unresolved LOW severity issues.
    pub low_severity_count: u32,
    /// Count of unresolved INFO severity issues.
    pub info_severity_count: u32,
    /// Count of resolved issues (of any severity).
    pub resolved_count: u32,
}

impl BranchCounters {
    /// Recomputes counters from a full issue slice, scanning rather than
    /// applying deltas (§9 design note: "Aggregate mutation via recompute,
    /// not delta" — delta arithmetic is subtly broken across concurrent
    /// writers and crash-restart windows).
    #[must_use]
    pub fn recompute(issues: &[BranchIssue]) -> Self {
        let mut counters = Self::default();
        for issue in issues {
            if issue.resolved {
                counters.resolved_count += 1;
                continue;
            }
            counters.total_issues += 1;
            match issue.severity {
                Severity::High => counters.high_severity_count += 1,
                Severity::Medium => counters.medium_severity_count += 1,
                Severity::Low => counters.low_severity_count += 1,
                Severity::Info => counters.info_severity_count += 1,
            }
        }
        counters
    }
}

/// A tracked branch within a project, created lazily on first analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Branch identifier.
    pub id: BranchId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Branch name; `(project_id, branch_name)` is unique.
    pub branch_name: BranchName,
    /// Latest observed commit hash on this branch.
    pub commit_hash: CommitHash,
    /// Commit hash of the most recent analysis that completed successfully.
    pub last_successful_commit_hash: Option<CommitHash>,
    /// Current health status.
    pub health_status: HealthStatus,
    /// Number of consecutive analysis failures observed for this branch.
    pub consecutive_failures: u32,
    /// Unix-millis timestamp of the last health check, if any.
    pub last_health_check_at: Option<i64>,
    /// Aggregate counters (Invariant B-1).
    pub counters: BranchCounters,
}

impl Branch {
    /// Recomputes and stores this branch's counters from the given issue
    /// slice. Callers are responsible for running this inside the same
    /// transaction that mutated the issues (§3, §5).
    pub fn recompute_counters(&mut self, issues: &[BranchIssue]) {
        self.counters = BranchCounters::recompute(issues);
    }
}

/// Link from a `Branch` to the authoritative `CodeAnalysisIssue` finding
/// record.
///
/// # Invariants
/// - `(branch_id, code_analysis_issue_id)` unique (BI-1).
/// - `resolved ⇒ (resolved_in_commit_hash ∨ resolved_in_pr_number)` is set
///   (BI-2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchIssue {
    /// Branch-issue link identifier.
    pub id: BranchIssueId,
    /// Owning branch.
    pub branch_id: BranchId,
    /// The authoritative finding this link tracks.
    pub code_analysis_issue_id: CodeAnalysisIssueId,
    /// File path the finding applies to (denormalized from the owning
    /// `CodeAnalysisIssue` for query convenience; see §9's open question on
    /// branch-index mapping).
    pub file_path: FilePath,
    /// Current severity (may lag the authoritative issue briefly; updated in
    /// lockstep during reconciliation, §4.6 step 6).
    pub severity: Severity,
    /// Whether this issue is currently resolved on this branch.
    pub resolved: bool,
    /// PR number the issue was first detected under.
    pub first_detected_pr_number: Option<PrNumber>,
    /// PR number the issue was resolved in, if resolved via a PR merge.
    pub resolved_in_pr_number: Option<PrNumber>,
    /// Commit hash the issue was resolved at, if resolved via direct commit
    /// attribution (branch reconciliation always sets this one, never
    /// `resolved_in_pr_number`, per §4.6 step 9).
    pub resolved_in_commit_hash: Option<CommitHash>,
    /// Free-text description of how the issue was resolved, if known.
    pub resolved_description: Option<String>,
    /// Unix-millis timestamp of resolution.
    pub resolved_at: Option<i64>,
    /// Who/what resolved the issue (a user handle or `"ai"`).
    pub resolved_by: Option<String>,
}

impl BranchIssue {
    /// Returns whether this issue satisfies Invariant BI-2.
    #[must_use]
    pub const fn satisfies_resolution_invariant(&self) -> bool {
        if !self.resolved {
            return true;
        }
        self.resolved_in_commit_hash.is_some() || self.resolved_in_pr_number.is_some()
    }
}

/// Per-file unresolved-issue count within a branch.
///
/// # Invariants
/// - `(project_id, branch_name, file_path)` unique.
/// - `issue_count >= 0` (represented as `u32`, so non-negativity is
///   structural).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchFile {
    /// Branch-file row identifier.
    pub id: BranchFileId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Branch this count applies to.
    pub branch_name: BranchName,
    /// File path within the repository.
    pub file_path: FilePath,
    /// Count of unresolved issues attributable to this file on this branch.
    pub issue_count: u32,
}

// ============================================================================
// SECTION: Pull Request
// ============================================================================

/// A tracked pull/merge request.
///
/// # Invariants
/// - `(project_id, pr_number)` unique.
/// - `pr_version` increases monotonically with every re-analysis of the same
///   PR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Pull request identifier.
    pub id: PullRequestId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Provider-assigned PR number.
    pub pr_number: PrNumber,
    /// Source (head) branch name.
    pub source_branch_name: BranchName,
    /// Target (base) branch name.
    pub target_branch_name: BranchName,
    /// Latest analyzed head commit.
    pub commit_hash: CommitHash,
    /// Monotonically increasing re-analysis counter.
    pub pr_version: u32,
}

// ============================================================================
// SECTION: Code Analysis
// ============================================================================

/// One row per analysis run (PR or branch).
///
/// # Invariants
/// - `(project_id, commit_hash, pr_number)` is the cache key (CA-1): an
///   ACCEPTED row for that key short-circuits a new run.
/// - Immutable once ACCEPTED, except for owned issue rows being flipped
///   `resolved`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeAnalysis {
    /// Analysis identifier.
    pub id: CodeAnalysisId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Which pipeline produced this run.
    pub analysis_type: AnalysisType,
    /// PR number, present for `PrAnalysis` runs.
    pub pr_number: Option<PrNumber>,
    /// Target branch name (or the only branch, for branch runs).
    pub branch_name: BranchName,
    /// Source branch name, present for `PrAnalysis` runs.
    pub source_branch_name: Option<BranchName>,
    /// Commit hash analyzed.
    pub commit_hash: CommitHash,
    /// PR version this run corresponds to (0 for branch runs).
    pub pr_version: u32,
    /// Lifecycle status.
    pub status: AnalysisStatus,
    /// Unix-millis creation timestamp.
    pub created_at: i64,
    /// Unix-millis last-update timestamp.
    pub updated_at: i64,
    /// Owned findings.
    pub issues: Vec<CodeAnalysisIssue>,
}

impl CodeAnalysis {
    /// Returns the `(project, commit, pr_number)` cache key for this run
    /// (Invariant CA-1).
    #[must_use]
    pub fn cache_key(&self) -> (ProjectId, &CommitHash, Option<PrNumber>) {
        (self.project_id, &self.commit_hash, self.pr_number)
    }

    /// Returns the count of issues that are findings (regardless of resolved
    /// state) — used for `Completed(..., issuesFound, ...)` event payloads.
    #[must_use]
    pub fn issues_found(&self) -> usize {
        self.issues.len()
    }
}

/// A single finding owned by a `CodeAnalysis` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeAnalysisIssue {
    /// Issue identifier.
    pub id: CodeAnalysisIssueId,
    /// Owning analysis run.
    pub code_analysis_id: CodeAnalysisId,
    /// File the finding applies to.
    pub file_path: FilePath,
    /// Line number the finding applies to, if line-granular.
    pub line_number: Option<u32>,
    /// Severity of the finding.
    pub severity: Severity,
    /// Human-readable explanation.
    pub reason: String,
    /// Suggested fix description, if the AI provided one.
    pub suggested_fix_description: Option<String>,
    /// Whether this finding has since been resolved.
    pub resolved: bool,
}

// ============================================================================
// SECTION: Lock
// ============================================================================

/// A live advisory lock row.
///
/// # Invariants
/// - `lock_key` unique across the table.
/// - At most one unexpired row exists per `(project_id, branch_name,
///   analysis_type)` (Invariant L-1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisLock {
    /// Opaque lock key, unique.
    pub lock_key: crate::identifiers::LockKey,
    /// Owning project.
    pub project_id: ProjectId,
    /// Branch the lock is scoped to.
    pub branch_name: BranchName,
    /// Analysis type the lock is scoped to.
    pub analysis_type: AnalysisType,
    /// Commit hash being analyzed, if known at acquisition time.
    pub commit_hash: Option<CommitHash>,
    /// PR number, for PR-analysis locks.
    pub pr_number: Option<PrNumber>,
    /// Unix-millis acquisition timestamp.
    pub acquired_at: i64,
    /// Unix-millis expiry timestamp.
    pub expires_at: i64,
}

#[cfg(test)]
#[allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]
mod tests {
    use super::*;

    fn issue(severity: Severity, resolved: bool) -> BranchIssue {
        BranchIssue {
            id: BranchIssueId::from_raw(1).expect("non-zero"),
            branch_id: BranchId::from_raw(1).expect("non-zero"),
            code_analysis_issue_id: CodeAnalysisIssueId::from_raw(1).expect("non-zero"),
            file_path: FilePath::from("src/a.py"),
            severity,
            resolved,
            first_detected_pr_number: None,
            resolved_in_pr_number: None,
            resolved_in_commit_hash: if resolved {
                Some(CommitHash::new("abc123"))
            } else {
                None
            },
            resolved_description: None,
            resolved_at: None,
            resolved_by: None,
        }
    }

    #[test]
    fn counters_recompute_partitions_unresolved_by_severity() {
        let issues = vec![
            issue(Severity::High, false),
            issue(Severity::High, false),
            issue(Severity::Medium, false),
            issue(Severity::Low, true),
            issue(Severity::Info, false),
        ];
        let counters = BranchCounters::recompute(&issues);
        assert_eq!(counters.total_issues, 4);
        assert_eq!(counters.high_severity_count, 2);
        assert_eq!(counters.medium_severity_count, 1);
        assert_eq!(counters.info_severity_count, 1);
        assert_eq!(counters.resolved_count, 1);
    }

    #[test]
    fn counters_recompute_on_empty_slice_is_all_zero() {
        let counters = BranchCounters::recompute(&[]);
        assert_eq!(counters, BranchCounters::default());
    }

    #[test]
    fn resolution_invariant_requires_attribution() {
        let mut resolved_issue = issue(Severity::High, true);
        assert!(resolved_issue.satisfies_resolution_invariant());
        resolved_issue.resolved_in_commit_hash = None;
        assert!(!resolved_issue.satisfies_resolution_invariant());
        resolved_issue.resolved_in_pr_number = PrNumber::from_raw(7);
        assert!(resolved_issue.satisfies_resolution_invariant());
    }
}
