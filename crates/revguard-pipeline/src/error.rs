// crates/revguard-pipeline/src/error.rs
// ============================================================================
// Module: Revguard Pipeline Error
// Description: Unified error type surfaced by both processors.
// Purpose: Give callers one error enum to match on, wrapping each
//   capability's own error type via `#[from]`, while the propagation policy
//   keeps best-effort failures (post-report, RAG, job-recorder) out of this
//   enum entirely — they never leave the processor as an `Err`.
// Dependencies: revguard-core, thiserror
// ============================================================================

use revguard_core::AiClientError;
use revguard_core::AnalysisLockedError;
use revguard_core::InvalidRequestError;
use revguard_core::LockError;
use revguard_core::StoreError;
use revguard_core::VcsError;

/// Errors a processor surfaces to its caller (§7's propagation policy:
/// `PostReportFailure`/`RagFailure`/`ProtocolMismatch` are recovered locally
/// and never appear here).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The request failed boundary validation.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] InvalidRequestError),
    /// Lock acquisition did not succeed within the wait window.
    #[error("lock contention: {0}")]
    Locked(#[from] AnalysisLockedError),
    /// The lock service itself failed (distinct from ordinary contention).
    #[error("lock service failure: {0}")]
    Lock(#[from] LockError),
    /// A VCS call failed after exhausting its retries.
    #[error("vcs failure: {0}")]
    Vcs(#[from] VcsError),
    /// The AI stream failed, errored, or ended without a terminal event.
    #[error("ai failure: {0}")]
    Ai(#[from] AiClientError),
    /// A persistence operation failed.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
    /// The project's AI binding is not configured; no analysis can run.
    #[error("project {0} has no AI binding configured")]
    AiNotConfigured(u64),
    /// The operation observed cancellation before completing.
    #[error("pipeline run cancelled")]
    Cancelled,
}
