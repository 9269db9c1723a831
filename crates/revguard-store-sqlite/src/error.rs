// crates/revguard-store-sqlite/src/error.rs
// ============================================================================
// Module: Revguard SQLite Store Errors
// Description: The store's own error enum and its conversion into each
//   capability trait's public error type.
// Purpose: Keep SQLite-specific failure detail (rusqlite error text, writer
//   thread termination) internal to this crate, surfacing only the shapes
//   revguard-core defines at the trait boundary.
// Dependencies: revguard-core, thiserror, rusqlite
// ============================================================================

use revguard_core::JobRecorderError;
use revguard_core::LockError;
use revguard_core::StoreError;
use thiserror::Error;

/// Errors internal to the SQLite-backed implementation, converted to the
/// relevant `revguard-core` error type at each trait boundary.
///
/// # Invariants
/// - Never leaks past this crate's public API; every `AnalysisStore`,
///   `LockService`, and `JobRecorder` method converts this into the core
///   error enum for that trait.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Filesystem or connection-setup failure.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// The database engine rejected or failed to execute a statement.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// The database's stamped schema version does not match this build.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// A row expected to exist was not found.
    #[error("sqlite store not found: {0}")]
    NotFound(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Backend(message),
            SqliteStoreError::Db(message) => Self::Backend(message),
            SqliteStoreError::VersionMismatch(message) => Self::Backend(message),
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
        }
    }
}

impl From<SqliteStoreError> for LockError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::NotFound(message) => Self::Store(message),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<SqliteStoreError> for JobRecorderError {
    fn from(error: SqliteStoreError) -> Self {
        Self::Backend(error.to_string())
    }
}
