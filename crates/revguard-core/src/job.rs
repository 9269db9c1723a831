// crates/revguard-core/src/job.rs
// ============================================================================
// Module: Revguard Job Records
// Description: Append-only audit trail of job lifecycle for observability.
// Purpose: Model the `JobRecorder` capability's persisted shape. The donor
//   workspace carries no console logging crate and denies print_stdout /
//   print_stderr outright; the only faithful rendition of "logging" here is
//   the one the donor already uses for its own audit aggregates: structured
//   records written to the store, never printed.
// Dependencies: crate::identifiers, serde
// ============================================================================

//! ## Overview
//! A [`JobRecord`] is an aggregate root owning an append-only log of
//! [`JobLogEntry`] rows, mirroring the donor's `RunState` append-only
//! `triggers`/`decisions`/`tool_calls` shape: entries are pushed, never
//! mutated or removed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::entities::AnalysisType;
use crate::identifiers::JobId;
use crate::identifiers::ProjectId;

// ============================================================================
// SECTION: Job Lifecycle
// ============================================================================

/// Severity of a single audit log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Informational progress note.
    Info,
    /// Recoverable condition worth surfacing.
    Warn,
    /// Unrecoverable condition for this job.
    Error,
}

/// Terminal or in-flight outcome of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobOutcome {
    /// Job is still in flight.
    #[default]
    Running,
    /// Job reached its terminal success state.
    Succeeded,
    /// Job reached its terminal failure state.
    Failed,
}

/// What external event caused a job to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerSource {
    /// A pull-request webhook event.
    PullRequestEvent,
    /// A push/merge webhook event.
    PushEvent,
    /// Manual re-invocation (e.g. via CLI or a retry action).
    Manual,
}

/// One append-only audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLogEntry {
    /// Severity of this entry.
    pub level: LogLevel,
    /// Pipeline stage the entry was recorded at (free-text, matching the
    /// step numbering in the pipeline specs, e.g. `"lock_acquire"`).
    pub stage: String,
    /// Human-readable message.
    pub message: String,
    /// Unix-millis timestamp.
    pub at: i64,
}

/// Audit-only append log of one job's lifecycle.
///
/// # Invariants
/// - `log` is append-only; entries are never edited or removed.
/// - `outcome` transitions `Running -> {Succeeded, Failed}` exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job identifier.
    pub id: JobId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Which pipeline this job ran.
    pub analysis_type: AnalysisType,
    /// What triggered the job.
    pub trigger_source: TriggerSource,
    /// Current pipeline stage (mirrors the latest log entry's stage).
    pub stage: String,
    /// Unix-millis creation timestamp.
    pub created_at: i64,
    /// Unix-millis completion timestamp, set once `outcome != Running`.
    pub completed_at: Option<i64>,
    /// Append-only log.
    pub log: Vec<JobLogEntry>,
    /// Terminal outcome.
    pub outcome: JobOutcome,
    /// Free-text summary set on success.
    pub summary: Option<String>,
    /// Free-text reason set on failure.
    pub failure_reason: Option<String>,
}
