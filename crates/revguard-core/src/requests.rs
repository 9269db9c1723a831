// crates/revguard-core/src/requests.rs
// ============================================================================
// Module: Revguard Analysis Requests
// Description: Inbound request shapes consumed by the two processors.
// Purpose: Model the validated request the out-of-scope HTTP adapter hands
//   to a processor, and the boundary validation that rejects malformed
//   requests before lock acquisition.
// Dependencies: crate::identifiers, serde
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::BranchName;
use crate::identifiers::CommitHash;
use crate::identifiers::LockKey;
use crate::identifiers::PrNumber;
use crate::identifiers::ProjectId;

// ============================================================================
// SECTION: PR Analysis Request
// ============================================================================

/// Request driving the `PrAnalysisProcessor` pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrAnalysisRequest {
    /// Project the PR belongs to.
    pub project_id: ProjectId,
    /// PR number.
    pub pr_number: PrNumber,
    /// Head commit to analyze.
    pub commit_hash: CommitHash,
    /// Source (head) branch.
    pub source_branch: BranchName,
    /// Target (base) branch.
    pub target_branch: BranchName,
    /// PR author handle, if known.
    pub pr_author: Option<String>,
    /// Existing placeholder comment id to update in place, if the adapter
    /// already posted one.
    pub placeholder_comment_id: Option<String>,
    /// Lock key already held by the caller, if any. When set, the pipeline
    /// skips acquisition and MUST NOT release it on exit.
    pub pre_acquired_lock_key: Option<LockKey>,
}

// ============================================================================
// SECTION: Branch Analysis Request
// ============================================================================

/// Request driving the `BranchAnalysisProcessor` pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchAnalysisRequest {
    /// Project the branch belongs to.
    pub project_id: ProjectId,
    /// Branch being reconciled.
    pub target_branch: BranchName,
    /// Commit hash of the push/merge.
    pub commit_hash: CommitHash,
    /// PR number the merge commit originated from, if any (drives which diff
    /// fetch is used: PR diff vs commit diff, §4.6 step 2).
    pub source_pr_number: Option<PrNumber>,
}

// ============================================================================
// SECTION: Polymorphic Envelope
// ============================================================================

/// The inbound request polymorphic over PR vs branch triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisRequest {
    /// A pull-request event.
    Pr(PrAnalysisRequest),
    /// A branch push/merge event.
    Branch(BranchAnalysisRequest),
}

/// Error raised when a request fails boundary validation before lock
/// acquisition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid analysis request: {0}")]
pub struct InvalidRequestError(pub String);

impl AnalysisRequest {
    /// Validates required fields, rejecting malformed requests before any
    /// lock acquisition is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRequestError`] when a required field is empty.
    pub fn validate(&self) -> Result<(), InvalidRequestError> {
        match self {
            Self::Pr(request) => {
                if request.source_branch.as_str().is_empty() {
                    return Err(InvalidRequestError("sourceBranch is required".to_string()));
                }
                if request.target_branch.as_str().is_empty() {
                    return Err(InvalidRequestError("targetBranch is required".to_string()));
                }
                if request.commit_hash.as_str().is_empty() {
                    return Err(InvalidRequestError("commitHash is required".to_string()));
                }
                Ok(())
            }
            Self::Branch(request) => {
                if request.target_branch.as_str().is_empty() {
                    return Err(InvalidRequestError("targetBranch is required".to_string()));
                }
                if request.commit_hash.as_str().is_empty() {
                    return Err(InvalidRequestError("commitHash is required".to_string()));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]
mod tests {
    use super::*;

    fn valid_pr_request() -> PrAnalysisRequest {
        PrAnalysisRequest {
            project_id: ProjectId::from_raw(1).expect("non-zero"),
            pr_number: PrNumber::from_raw(42).expect("non-zero"),
            commit_hash: CommitHash::new("abc123"),
            source_branch: BranchName::from("feat/x"),
            target_branch: BranchName::from("main"),
            pr_author: None,
            placeholder_comment_id: None,
            pre_acquired_lock_key: None,
        }
    }

    #[test]
    fn valid_pr_request_passes_validation() {
        let request = AnalysisRequest::Pr(valid_pr_request());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn empty_commit_hash_is_rejected() {
        let mut pr = valid_pr_request();
        pr.commit_hash = CommitHash::new("");
        let request = AnalysisRequest::Pr(pr);
        assert!(request.validate().is_err());
    }

    #[test]
    fn empty_target_branch_is_rejected_for_branch_requests() {
        let request = AnalysisRequest::Branch(BranchAnalysisRequest {
            project_id: ProjectId::from_raw(1).expect("non-zero"),
            target_branch: BranchName::from(""),
            commit_hash: CommitHash::new("abc123"),
            source_pr_number: None,
        });
        assert!(request.validate().is_err());
    }
}
