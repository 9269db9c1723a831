// crates/revguard-store-sqlite/src/lib.rs
// ============================================================================
// Module: Revguard SQLite Store
// Description: Durable `AnalysisStore`/`LockService`/`JobRecorder`
//   implementation backed by a single SQLite database.
// Purpose: Give the orchestration core a persistence backend it can run
//   against a plain file, with no external database service.
// Dependencies: revguard-core, rusqlite, uuid
// ============================================================================

//! ## Overview
//! One SQLite database serves every capability this crate implements. A
//! single writer-gateway thread (see [`writer`]) owns the sole writable
//! connection; a small round-robin pool of read-only connections serves the
//! query-only trait methods. See `DESIGN.md` at the workspace root for the
//! grounding of this design in the donor's own `decision-gate-store-sqlite`
//! crate, and for the points where this crate's design deliberately departs
//! from it.

#![forbid(unsafe_code)]

mod error;
mod mapping;
mod schema;
mod store;
mod writer;

pub use error::SqliteStoreError;
pub use store::SqliteStore;
