// crates/revguard-core/src/lib.rs
// ============================================================================
// Module: Revguard Core
// Description: Domain model, capability traits, and request/event types
//   shared by every crate in the analysis orchestration workspace.
// Purpose: Provide the one dependency every other crate in the workspace can
//   rely on without depending on each other.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! `revguard-core` holds the parts of the analysis orchestration core with no
//! I/O of their own: identifiers, entities and their invariants, the
//! `EventSink` trait and its two reference implementations, the capability
//! traits consumed by `revguard-vcs`/`revguard-ai`/`revguard-rag`/
//! `revguard-store-sqlite`, and the inbound request envelope.
//!
//! Nothing in this crate performs file, network, or database I/O.

#![forbid(unsafe_code)]

/// Cooperative cancellation primitive threaded through every blocking call.
pub mod cancellation;
/// Aggregate roots, detail rows, and the data-model invariants they uphold.
pub mod entities;
/// Event taxonomy and the `EventSink` callback surface.
pub mod events;
/// Newtype identifiers for every aggregate and detail row.
pub mod identifiers;
/// Backend-agnostic capability traits (VCS, AI, RAG, lock, store, recorder).
pub mod interfaces;
/// Audit-trail aggregate (`JobRecord`) and its append-only log shape.
pub mod job;
/// Inbound request envelope and boundary validation.
pub mod requests;

pub use cancellation::CancellationToken;
pub use entities::AnalysisLock;
pub use entities::AnalysisStatus;
pub use entities::AnalysisType;
pub use entities::Branch;
pub use entities::BranchCounters;
pub use entities::BranchFile;
pub use entities::BranchIssue;
pub use entities::CodeAnalysis;
pub use entities::CodeAnalysisIssue;
pub use entities::HealthStatus;
pub use entities::Project;
pub use entities::ProjectConfig;
pub use entities::PullRequest;
pub use entities::Severity;
pub use entities::VcsConnection;
pub use entities::VcsProvider;
pub use events::AnalysisEvent;
pub use events::CollectingEventSink;
pub use events::CompletionOutcome;
pub use events::EventSink;
pub use events::NdjsonEventSink;
pub use identifiers::BranchFileId;
pub use identifiers::BranchId;
pub use identifiers::BranchIssueId;
pub use identifiers::BranchName;
pub use identifiers::CodeAnalysisId;
pub use identifiers::CodeAnalysisIssueId;
pub use identifiers::CommitHash;
pub use identifiers::CorrelationId;
pub use identifiers::FilePath;
pub use identifiers::JobId;
pub use identifiers::LockKey;
pub use identifiers::PrNumber;
pub use identifiers::ProjectId;
pub use identifiers::PullRequestId;
pub use interfaces::AcquireOutcome;
pub use interfaces::AiClient;
pub use interfaces::AiClientError;
pub use interfaces::AiFinding;
pub use interfaces::AiFindingsResult;
pub use interfaces::AiPriorIssue;
pub use interfaces::AiReconciliationResult;
pub use interfaces::AiRequest;
pub use interfaces::AiResolutionDecision;
pub use interfaces::AnalysisLockedError;
pub use interfaces::AnalysisStore;
pub use interfaces::JobRecorder;
pub use interfaces::JobRecorderError;
pub use interfaces::LockError;
pub use interfaces::LockService;
pub use interfaces::NewCodeAnalysis;
pub use interfaces::PostReportOutcome;
pub use interfaces::RagError;
pub use interfaces::RagOperations;
pub use interfaces::StoreError;
pub use interfaces::VcsError;
pub use interfaces::VcsOperations;
pub use job::JobLogEntry;
pub use job::JobOutcome;
pub use job::JobRecord;
pub use job::LogLevel;
pub use job::TriggerSource;
pub use requests::AnalysisRequest;
pub use requests::BranchAnalysisRequest;
pub use requests::InvalidRequestError;
pub use requests::PrAnalysisRequest;
