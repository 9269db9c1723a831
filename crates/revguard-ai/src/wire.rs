// crates/revguard-ai/src/wire.rs
// ============================================================================
// Module: Revguard AI Wire Protocol
// Description: JSON shapes exchanged with the AI service over HTTP, distinct
//   from the normalized `revguard_core::interfaces` types the rest of the
//   workspace depends on.
// Purpose: Keep the camelCase wire contract isolated to this crate so a
//   protocol change never ripples into `revguard-core`.
// Dependencies: revguard-core, serde, serde_json
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use revguard_core::AiPriorIssue;
use revguard_core::AiRequest;

/// Request body posted to `{aiBaseUrl}/analyze`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireRequest {
    project_id: u64,
    target_branch: String,
    source_branch: Option<String>,
    commit_hash: String,
    pr_number: Option<u64>,
    changed_files: Vec<String>,
    raw_diff: String,
    prior_issues: Vec<WirePriorIssue>,
    prior_analysis_count: u32,
    analysis_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePriorIssue {
    issue_id: u64,
    file_path: String,
    line_number: Option<u32>,
    severity: &'static str,
    reason: String,
}

impl From<&AiRequest> for WireRequest {
    fn from(request: &AiRequest) -> Self {
        Self {
            project_id: request.project_id.get(),
            target_branch: request.target_branch.as_str().to_string(),
            source_branch: request.source_branch.as_ref().map(|b| b.as_str().to_string()),
            commit_hash: request.commit_hash.as_str().to_string(),
            pr_number: request.pr_number.map(revguard_core::PrNumber::get),
            changed_files: request.changed_files.iter().map(|f| f.as_str().to_string()).collect(),
            raw_diff: request.raw_diff.clone(),
            prior_issues: request.prior_issues.iter().map(wire_prior_issue).collect(),
            prior_analysis_count: request.prior_analysis_count,
            analysis_type: analysis_type_label(request.analysis_type),
        }
    }
}

fn wire_prior_issue(issue: &AiPriorIssue) -> WirePriorIssue {
    WirePriorIssue {
        issue_id: issue.issue_id.get(),
        file_path: issue.file_path.as_str().to_string(),
        line_number: issue.line_number,
        severity: severity_label(issue.severity),
        reason: issue.reason.clone(),
    }
}

const fn analysis_type_label(analysis_type: revguard_core::AnalysisType) -> &'static str {
    match analysis_type {
        revguard_core::AnalysisType::PrAnalysis => "PR_ANALYSIS",
        revguard_core::AnalysisType::BranchAnalysis => "BRANCH_ANALYSIS",
    }
}

const fn severity_label(severity: revguard_core::Severity) -> &'static str {
    match severity {
        revguard_core::Severity::Info => "INFO",
        revguard_core::Severity::Low => "LOW",
        revguard_core::Severity::Medium => "MEDIUM",
        revguard_core::Severity::High => "HIGH",
    }
}

/// One line of the ndjson response body, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum WireEvent {
    /// Informational state change.
    Status {
        /// Provider-defined state label.
        state: String,
        /// Human-readable message.
        message: String,
    },
    /// Progress counter update.
    Progress {
        /// Units processed so far.
        processed: u64,
        /// Total units expected, if known.
        total: Option<u64>,
    },
    /// An in-progress finding, accumulated as more of the diff is analyzed.
    PartialIssue {
        #[serde(rename = "filePath")]
        file_path: String,
        #[serde(rename = "lineNumber")]
        line_number: Option<u32>,
        severity: Option<String>,
        #[serde(default)]
        reason: String,
    },
    /// Non-fatal warning from the AI service.
    Warning {
        /// Human-readable warning message.
        message: String,
    },
    /// Fatal error; terminates the stream.
    Error {
        /// Human-readable error message.
        message: String,
    },
    /// Terminal success event. `issues` is a list or a keyed map — callers
    /// normalize either shape.
    Result {
        #[serde(default)]
        issues: serde_json::Value,
        comment: Option<String>,
    },
}
