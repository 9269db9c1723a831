// crates/revguard-store-sqlite/src/schema.rs
// ============================================================================
// Module: Revguard SQLite Schema
// Description: Connection setup, pragmas, and the versioned table layout
//   backing AnalysisStore/LockService/JobRecorder.
// Purpose: Give both the writer and read-pool connections an identical,
//   idempotent schema bootstrap.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! Mirrors the donor's `store_meta` version-table pattern
//! (`decision-gate-store-sqlite/src/store.rs`): a single-row table records
//! the schema version, and `initialize_schema` either bootstraps a fresh
//! database or rejects a version it doesn't recognise. There is only one
//! schema generation in this workspace, so there are no migration arms yet —
//! the `Some(v) if v == SCHEMA_VERSION` / `Some(v) => Err(..)` shape is kept
//! so a future generation slots in the same way the donor's does.

use std::path::Path;

use rusqlite::Connection;
use rusqlite::OpenFlags;

use crate::error::SqliteStoreError;

/// Current schema version stamped into `store_meta`.
pub(crate) const SCHEMA_VERSION: i64 = 1;

/// Default busy timeout applied to every connection.
pub(crate) const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5_000;

/// Creates the parent directory of `path` if it does not already exist.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|err| SqliteStoreError::Io(format!("failed to create db directory: {err}")))?;
    }
    Ok(())
}

/// Opens a connection at `path`, creating the file if absent.
pub(crate) fn open_connection(path: &Path) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    Connection::open_with_flags(path, flags)
        .map_err(|err| SqliteStoreError::Db(format!("failed to open sqlite connection: {err}")))
}

/// Opens a read-only connection at `path`. The file must already exist.
pub(crate) fn open_read_connection(path: &Path) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    Connection::open_with_flags(path, flags)
        .map_err(|err| SqliteStoreError::Db(format!("failed to open sqlite read connection: {err}")))
}

/// Applies WAL journal mode, synchronous mode, and the busy timeout.
pub(crate) fn apply_pragmas(
    connection: &Connection,
    busy_timeout_ms: u32,
) -> Result<(), SqliteStoreError> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .map_err(|err| SqliteStoreError::Db(format!("failed to set journal_mode: {err}")))?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .map_err(|err| SqliteStoreError::Db(format!("failed to set synchronous: {err}")))?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .map_err(|err| SqliteStoreError::Db(format!("failed to set foreign_keys: {err}")))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(u64::from(busy_timeout_ms)))
        .map_err(|err| SqliteStoreError::Db(format!("failed to set busy_timeout: {err}")))?;
    Ok(())
}

/// Bootstraps the schema on a fresh database, or validates the version of an
/// existing one.
pub(crate) fn initialize_schema(connection: &Connection) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("CREATE TABLE IF NOT EXISTS store_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
        .map_err(|err| SqliteStoreError::Db(format!("failed to create store_meta: {err}")))?;

    let existing_version: Option<i64> = connection
        .query_row(
            "SELECT value FROM store_meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .ok()
        .and_then(|value| value.parse().ok());

    match existing_version {
        None => {
            connection
                .execute_batch(SCHEMA_DDL)
                .map_err(|err| SqliteStoreError::Db(format!("failed to create schema: {err}")))?;
            connection
                .execute(
                    "INSERT INTO store_meta (key, value) VALUES ('schema_version', ?1)",
                    [SCHEMA_VERSION.to_string()],
                )
                .map_err(|err| SqliteStoreError::Db(format!("failed to stamp schema version: {err}")))?;
            Ok(())
        }
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(version) => Err(SqliteStoreError::VersionMismatch(format!(
            "database schema version {version} does not match expected {SCHEMA_VERSION}"
        ))),
    }
}

/// Full DDL for a fresh database, executed as one batch inside
/// [`initialize_schema`].
const SCHEMA_DDL: &str = "
CREATE TABLE project (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    namespace TEXT NOT NULL,
    workspace_ref TEXT NOT NULL,
    vcs_provider TEXT NOT NULL,
    vcs_workspace TEXT NOT NULL,
    vcs_repo_slug TEXT NOT NULL,
    ai_base_url TEXT,
    ai_use_local_mcp INTEGER,
    default_branch TEXT,
    pr_analysis_enabled INTEGER NOT NULL,
    branch_analysis_enabled INTEGER NOT NULL,
    rag_enabled INTEGER NOT NULL,
    rag_base_url TEXT,
    comment_commands_enabled INTEGER NOT NULL,
    comment_commands_prefix TEXT NOT NULL
);

CREATE TABLE branch (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL,
    branch_name TEXT NOT NULL,
    commit_hash TEXT NOT NULL,
    last_successful_commit_hash TEXT,
    health_status TEXT NOT NULL,
    consecutive_failures INTEGER NOT NULL,
    last_health_check_at INTEGER,
    total_issues INTEGER NOT NULL,
    high_severity_count INTEGER NOT NULL,
    medium_severity_count INTEGER NOT NULL,
    low_severity_count INTEGER NOT NULL,
    info_severity_count INTEGER NOT NULL,
    resolved_count INTEGER NOT NULL,
    UNIQUE(project_id, branch_name)
);

CREATE TABLE branch_issue (
    id INTEGER PRIMARY KEY,
    branch_id INTEGER NOT NULL,
    code_analysis_issue_id INTEGER NOT NULL,
    file_path TEXT NOT NULL,
    severity TEXT NOT NULL,
    resolved INTEGER NOT NULL,
    first_detected_pr_number INTEGER,
    resolved_in_pr_number INTEGER,
    resolved_in_commit_hash TEXT,
    resolved_description TEXT,
    resolved_at INTEGER,
    resolved_by TEXT,
    UNIQUE(branch_id, code_analysis_issue_id)
);

CREATE TABLE branch_file (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL,
    branch_name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    issue_count INTEGER NOT NULL,
    UNIQUE(project_id, branch_name, file_path)
);

CREATE TABLE pull_request (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL,
    pr_number INTEGER NOT NULL,
    source_branch_name TEXT NOT NULL,
    target_branch_name TEXT NOT NULL,
    commit_hash TEXT NOT NULL,
    pr_version INTEGER NOT NULL,
    UNIQUE(project_id, pr_number)
);

CREATE TABLE code_analysis (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL,
    analysis_type TEXT NOT NULL,
    pr_number INTEGER,
    branch_name TEXT NOT NULL,
    source_branch_name TEXT,
    commit_hash TEXT NOT NULL,
    pr_version INTEGER NOT NULL,
    status TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX code_analysis_cache_key ON code_analysis(project_id, commit_hash, pr_number);
CREATE INDEX code_analysis_branch_target ON code_analysis(branch_name);
CREATE INDEX code_analysis_branch_source ON code_analysis(source_branch_name);
CREATE INDEX code_analysis_pr ON code_analysis(project_id, pr_number);

CREATE TABLE code_analysis_issue (
    id INTEGER PRIMARY KEY,
    code_analysis_id INTEGER NOT NULL,
    file_path TEXT NOT NULL,
    line_number INTEGER,
    severity TEXT NOT NULL,
    reason TEXT NOT NULL,
    suggested_fix_description TEXT,
    resolved INTEGER NOT NULL
);
CREATE INDEX code_analysis_issue_owner ON code_analysis_issue(code_analysis_id);
CREATE INDEX code_analysis_issue_file ON code_analysis_issue(file_path);

CREATE TABLE analysis_lock (
    lock_key TEXT PRIMARY KEY,
    project_id INTEGER NOT NULL,
    branch_name TEXT NOT NULL,
    analysis_type TEXT NOT NULL,
    commit_hash TEXT,
    pr_number INTEGER,
    acquired_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    active INTEGER,
    UNIQUE(project_id, branch_name, analysis_type, active)
);

CREATE TABLE job_record (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL,
    analysis_type TEXT NOT NULL,
    trigger_source TEXT NOT NULL,
    stage TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    completed_at INTEGER,
    outcome TEXT NOT NULL,
    summary TEXT,
    failure_reason TEXT
);

CREATE TABLE job_log_entry (
    id INTEGER PRIMARY KEY,
    job_id INTEGER NOT NULL,
    level TEXT NOT NULL,
    stage TEXT NOT NULL,
    message TEXT NOT NULL,
    at INTEGER NOT NULL
);
CREATE INDEX job_log_entry_owner ON job_log_entry(job_id);
";

#[cfg(test)]
#[allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]
mod tests {
    use super::*;

    #[test]
    fn initialize_schema_is_idempotent() {
        let connection = Connection::open_in_memory().expect("open in-memory connection");
        initialize_schema(&connection).expect("first init");
        initialize_schema(&connection).expect("second init is a no-op");
    }

    #[test]
    fn stamped_version_matches_constant() {
        let connection = Connection::open_in_memory().expect("open in-memory connection");
        initialize_schema(&connection).expect("init");
        let stamped: String = connection
            .query_row(
                "SELECT value FROM store_meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .expect("read stamped version");
        assert_eq!(stamped, SCHEMA_VERSION.to_string());
    }
}
