// crates/revguard-pipeline/src/lib.rs
// ============================================================================
// Module: Revguard Pipeline
// Description: End-to-end orchestration over the capability traits defined
//   in revguard-core: PrAnalysisProcessor (§4.5) and
//   BranchAnalysisProcessor (§4.6).
// Purpose: Give a caller (the HTTP adapter, the CLI) one entry point per
//   trigger kind, wired over injected capabilities rather than concrete
//   backends.
// Dependencies: revguard-core, revguard-diff, thiserror, uuid
// ============================================================================

//! ## Overview
//! This crate owns no state of its own: both processors are plain structs
//! holding `Arc<dyn Capability>` handles, constructed once by the caller and
//! reused across requests. `error` carries the unified [`PipelineError`]
//! both processors surface; `support` holds the small helpers shared between
//! them.

#![forbid(unsafe_code)]

/// Orchestration for branch push/merge reconciliation runs (§4.6).
pub mod branch_analysis;
/// The unified error type surfaced by both processors (§7).
pub mod error;
/// Orchestration for pull-request-triggered analysis runs (§4.5).
pub mod pr_analysis;
/// Small helpers shared by both processors.
mod support;

pub use branch_analysis::BranchAnalysisOutcome;
pub use branch_analysis::BranchAnalysisProcessor;
pub use error::PipelineError;
pub use pr_analysis::PrAnalysisOutcome;
pub use pr_analysis::PrAnalysisProcessor;
