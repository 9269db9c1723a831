// crates/revguard-pipeline/src/support.rs
// ============================================================================
// Module: Revguard Pipeline Support
// Description: Small helpers shared by both processors: timestamps,
//   correlation ids, and prior-issue projection for the AI request.
// Purpose: Keep the processor modules focused on step sequencing rather
//   than these mechanical conversions.
// Dependencies: revguard-core, uuid
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use revguard_core::AiPriorIssue;
use revguard_core::CodeAnalysisIssue;
use revguard_core::CorrelationId;

/// Current time as Unix-millis, saturating to `i64::MAX` rather than
/// overflowing or panicking (mirrors `revguard-store-sqlite`'s private
/// helper of the same shape).
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Generates a fresh correlation id for one pipeline invocation.
pub(crate) fn fresh_correlation_id() -> CorrelationId {
    CorrelationId::new(uuid::Uuid::new_v4().to_string())
}

/// Projects a prior analysis's unresolved issues into the `AiPriorIssue`
/// shape the AI request carries, for incremental-diff and resolution
/// context (§4.4).
pub(crate) fn unresolved_as_prior_issues(issues: &[CodeAnalysisIssue]) -> Vec<AiPriorIssue> {
    issues
        .iter()
        .filter(|issue| !issue.resolved)
        .map(|issue| AiPriorIssue {
            issue_id: issue.id,
            file_path: issue.file_path.clone(),
            line_number: issue.line_number,
            severity: issue.severity,
            reason: issue.reason.clone(),
        })
        .collect()
}
