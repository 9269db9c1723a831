// crates/revguard-store-sqlite/src/store.rs
// ============================================================================
// Module: Revguard SQLite Store
// Description: `AnalysisStore`/`LockService`/`JobRecorder` backed by one
//   SQLite database, through a single writer-gateway thread and a read
//   connection pool.
// Purpose: The durable implementation of every persistence capability the
//   pipelines depend on.
// Dependencies: revguard-core, rusqlite, uuid
// ============================================================================

//! ## Overview
//! Reads and writes are split across two connection pools: a single
//! writable [`WriteGateway`]-owned connection for every mutating statement,
//! and a small round-robin pool of read-only connections (mirroring the
//! donor's `SqliteRunStateStore` split) for the query-only trait methods.
//! WAL journal mode lets readers proceed concurrently with the writer.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;

use revguard_core::AcquireOutcome;
use revguard_core::AiFinding;
use revguard_core::AnalysisEvent;
use revguard_core::AnalysisStore;
use revguard_core::AnalysisType;
use revguard_core::Branch;
use revguard_core::BranchFile;
use revguard_core::BranchId;
use revguard_core::BranchIssue;
use revguard_core::BranchIssueId;
use revguard_core::BranchName;
use revguard_core::CancellationToken;
use revguard_core::CodeAnalysis;
use revguard_core::CodeAnalysisId;
use revguard_core::CodeAnalysisIssue;
use revguard_core::CommitHash;
use revguard_core::EventSink;
use revguard_core::FilePath;
use revguard_core::JobId;
use revguard_core::JobRecorder;
use revguard_core::JobRecorderError;
use revguard_core::LockError;
use revguard_core::LockKey;
use revguard_core::LockService;
use revguard_core::NewCodeAnalysis;
use revguard_core::PrNumber;
use revguard_core::Project;
use revguard_core::ProjectId;
use revguard_core::PullRequest;
use revguard_core::StoreError;
use revguard_core::job::TriggerSource;

use crate::error::SqliteStoreError;
use crate::mapping;
use crate::schema;
use crate::writer::WriteGateway;

/// Number of read-only connections kept in the round-robin pool.
const READ_POOL_SIZE: usize = 4;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Default advisory lock TTL per analysis type. `LockService::acquire` takes
/// no TTL parameter, so the store bakes in a TTL per type; a future
/// `revguard-config` integration may make this caller-configurable.
fn default_lock_ttl(analysis_type: AnalysisType) -> Duration {
    match analysis_type {
        AnalysisType::PrAnalysis => Duration::from_secs(10 * 60),
        AnalysisType::BranchAnalysis => Duration::from_secs(15 * 60),
        AnalysisType::RagIndexing => Duration::from_secs(5 * 60),
    }
}

/// Durable [`AnalysisStore`], [`LockService`], and [`JobRecorder`]
/// implementation backed by one SQLite database file.
pub struct SqliteStore {
    writer: WriteGateway,
    read_pool: Arc<Vec<Mutex<Connection>>>,
    read_cursor: AtomicUsize,
}

impl SqliteStore {
    /// Opens (creating if absent) the database at `path`, bootstraps its
    /// schema, and spawns the writer-gateway thread.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the database file or its parent
    /// directory cannot be created, or the schema cannot be initialized or
    /// validated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SqliteStoreError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        schema::ensure_parent_dir(&path)?;

        let write_connection = schema::open_connection(&path)?;
        schema::apply_pragmas(&write_connection, schema::DEFAULT_BUSY_TIMEOUT_MS)?;
        schema::initialize_schema(&write_connection)?;

        let mut read_connections = Vec::with_capacity(READ_POOL_SIZE);
        for _ in 0..READ_POOL_SIZE {
            let read_connection = schema::open_read_connection(&path)?;
            schema::apply_pragmas(&read_connection, schema::DEFAULT_BUSY_TIMEOUT_MS)?;
            read_connections.push(Mutex::new(read_connection));
        }

        let writer = WriteGateway::spawn(write_connection)?;

        Ok(Self {
            writer,
            read_pool: Arc::new(read_connections),
            read_cursor: AtomicUsize::new(0),
        })
    }

    fn with_read<T, F>(&self, operation: F) -> Result<T, SqliteStoreError>
    where
        F: FnOnce(&Connection) -> Result<T, SqliteStoreError>,
    {
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % self.read_pool.len();
        let connection = self.read_pool[index]
            .lock()
            .map_err(|_err| SqliteStoreError::Db("read connection mutex poisoned".to_string()))?;
        operation(&connection)
    }

    /// Inserts a `project` row directly, bypassing the out-of-scope project
    /// provisioning flow. Project creation has no trait method (§9: "out of
    /// scope"); this inherent helper exists solely for CLI fixtures and
    /// integration tests that need a project row to exercise the rest of the
    /// store against. See `DESIGN.md` for the resolution.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on a backend failure.
    pub fn seed_project(&self, project: &Project) -> Result<ProjectId, SqliteStoreError> {
        let project = project.clone();
        self.writer.submit(move |connection| {
            connection
                .execute(
                    "INSERT INTO project (
                        id, name, namespace, workspace_ref, vcs_provider, vcs_workspace,
                        vcs_repo_slug, ai_base_url, ai_use_local_mcp, default_branch,
                        pr_analysis_enabled, branch_analysis_enabled, rag_enabled,
                        rag_base_url, comment_commands_enabled, comment_commands_prefix
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                    params![
                        i64::try_from(project.id.get()).unwrap_or(i64::MAX),
                        project.name,
                        project.namespace,
                        project.workspace_ref,
                        mapping::vcs_provider_to_text(project.vcs_connection.provider),
                        project.vcs_connection.workspace,
                        project.vcs_connection.repo_slug,
                        project.ai_binding.as_ref().map(|binding| binding.base_url.clone()),
                        project.ai_binding.as_ref().map(|binding| binding.use_local_mcp),
                        project.default_branch.as_ref().map(BranchName::as_str),
                        project.config.pr_analysis_enabled,
                        project.config.branch_analysis_enabled,
                        project.config.rag_config.enabled,
                        project.config.rag_config.base_url,
                        project.config.comment_commands_config.enabled,
                        project.config.comment_commands_config.prefix,
                    ],
                )
                .map_err(|err| SqliteStoreError::Db(format!("seed_project failed: {err}")))?;
            Ok(project.id)
        })
    }
}

// ============================================================================
// SECTION: AnalysisStore
// ============================================================================

impl AnalysisStore for SqliteStore {
    fn get_project(&self, project_id: ProjectId) -> Result<Option<Project>, StoreError> {
        self.with_read(|connection| {
            connection
                .query_row(
                    "SELECT * FROM project WHERE id = ?1",
                    params![i64::try_from(project_id.get()).unwrap_or(i64::MAX)],
                    mapping::project_from_row,
                )
                .optional()
                .map_err(|err| SqliteStoreError::Db(format!("get_project failed: {err}")))
        })
        .map_err(StoreError::from)
    }

    fn upsert_pull_request(
        &self,
        project_id: ProjectId,
        pr_number: PrNumber,
        source_branch_name: &BranchName,
        target_branch_name: &BranchName,
        commit_hash: &CommitHash,
    ) -> Result<PullRequest, StoreError> {
        let source_branch_name = source_branch_name.clone();
        let target_branch_name = target_branch_name.clone();
        let commit_hash = commit_hash.clone();
        self.writer
            .submit(move |connection| {
                let existing: Option<(i64, String, u32)> = connection
                    .query_row(
                        "SELECT id, commit_hash, pr_version FROM pull_request WHERE project_id = ?1 AND pr_number = ?2",
                        params![
                            i64::try_from(project_id.get()).unwrap_or(i64::MAX),
                            i64::try_from(pr_number.get()).unwrap_or(i64::MAX)
                        ],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )
                    .optional()
                    .map_err(|err| SqliteStoreError::Db(format!("upsert_pull_request lookup failed: {err}")))?;

                let id = match existing {
                    None => {
                        connection
                            .execute(
                                "INSERT INTO pull_request (
                                    project_id, pr_number, source_branch_name, target_branch_name,
                                    commit_hash, pr_version
                                ) VALUES (?1, ?2, ?3, ?4, ?5, 1)",
                                params![
                                    i64::try_from(project_id.get()).unwrap_or(i64::MAX),
                                    i64::try_from(pr_number.get()).unwrap_or(i64::MAX),
                                    source_branch_name.as_str(),
                                    target_branch_name.as_str(),
                                    commit_hash.as_str(),
                                ],
                            )
                            .map_err(|err| SqliteStoreError::Db(format!("upsert_pull_request insert failed: {err}")))?;
                        connection.last_insert_rowid()
                    }
                    Some((id, existing_commit_hash, existing_version)) => {
                        let next_version = if existing_commit_hash == commit_hash.as_str() {
                            existing_version
                        } else {
                            existing_version + 1
                        };
                        connection
                            .execute(
                                "UPDATE pull_request SET source_branch_name = ?2, target_branch_name = ?3,
                                    commit_hash = ?4, pr_version = ?5 WHERE id = ?1",
                                params![
                                    id,
                                    source_branch_name.as_str(),
                                    target_branch_name.as_str(),
                                    commit_hash.as_str(),
                                    next_version,
                                ],
                            )
                            .map_err(|err| SqliteStoreError::Db(format!("upsert_pull_request update failed: {err}")))?;
                        id
                    }
                };

                connection
                    .query_row(
                        "SELECT * FROM pull_request WHERE id = ?1",
                        params![id],
                        mapping::pull_request_from_row,
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("upsert_pull_request reload failed: {err}")))
            })
            .map_err(StoreError::from)
    }

    fn find_accepted_analysis(
        &self,
        project_id: ProjectId,
        commit_hash: &CommitHash,
        pr_number: Option<PrNumber>,
    ) -> Result<Option<CodeAnalysis>, StoreError> {
        let commit_hash = commit_hash.clone();
        self.with_read(|connection| {
            let row: Option<CodeAnalysis> = connection
                .query_row(
                    "SELECT * FROM code_analysis WHERE project_id = ?1 AND commit_hash = ?2
                        AND pr_number IS ?3 AND status = 'ACCEPTED'",
                    params![
                        i64::try_from(project_id.get()).unwrap_or(i64::MAX),
                        commit_hash.as_str(),
                        pr_number.map(|value| i64::try_from(value.get()).unwrap_or(i64::MAX)),
                    ],
                    mapping::code_analysis_from_row,
                )
                .optional()
                .map_err(|err| SqliteStoreError::Db(format!("find_accepted_analysis failed: {err}")))?;

            let Some(mut analysis) = row else {
                return Ok(None);
            };
            analysis.issues = load_issues(connection, analysis.id)?;
            Ok(Some(analysis))
        })
        .map_err(StoreError::from)
    }

    fn list_prior_analyses(
        &self,
        project_id: ProjectId,
        pr_number: PrNumber,
    ) -> Result<Vec<CodeAnalysis>, StoreError> {
        self.with_read(|connection| {
            let mut statement = connection
                .prepare(
                    "SELECT * FROM code_analysis WHERE project_id = ?1 AND pr_number = ?2
                        ORDER BY created_at DESC",
                )
                .map_err(|err| SqliteStoreError::Db(format!("list_prior_analyses prepare failed: {err}")))?;
            let rows = statement
                .query_map(
                    params![
                        i64::try_from(project_id.get()).unwrap_or(i64::MAX),
                        i64::try_from(pr_number.get()).unwrap_or(i64::MAX)
                    ],
                    mapping::code_analysis_from_row,
                )
                .map_err(|err| SqliteStoreError::Db(format!("list_prior_analyses query failed: {err}")))?;

            let mut analyses = Vec::new();
            for row in rows {
                let mut analysis =
                    row.map_err(|err| SqliteStoreError::Db(format!("list_prior_analyses row failed: {err}")))?;
                analysis.issues = load_issues(connection, analysis.id)?;
                analyses.push(analysis);
            }
            Ok(analyses)
        })
        .map_err(StoreError::from)
    }

    fn create_analysis(&self, new_analysis: NewCodeAnalysis) -> Result<CodeAnalysis, StoreError> {
        self.writer
            .submit(move |connection| {
                let now = now_millis();
                let transaction = connection
                    .unchecked_transaction()
                    .map_err(|err| SqliteStoreError::Db(format!("create_analysis begin failed: {err}")))?;

                transaction
                    .execute(
                        "INSERT INTO code_analysis (
                            project_id, analysis_type, pr_number, branch_name, source_branch_name,
                            commit_hash, pr_version, status, created_at, updated_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'ACCEPTED', ?8, ?8)",
                        params![
                            i64::try_from(new_analysis.project_id.get()).unwrap_or(i64::MAX),
                            mapping::analysis_type_to_text(new_analysis.analysis_type),
                            new_analysis
                                .pr_number
                                .map(|value| i64::try_from(value.get()).unwrap_or(i64::MAX)),
                            new_analysis.branch_name.as_str(),
                            new_analysis.source_branch_name.as_ref().map(BranchName::as_str),
                            new_analysis.commit_hash.as_str(),
                            new_analysis.pr_version,
                            now,
                        ],
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("create_analysis insert failed: {err}")))?;
                let analysis_id = transaction.last_insert_rowid();

                for finding in &new_analysis.issues {
                    insert_issue(&transaction, analysis_id, finding)?;
                }

                transaction
                    .commit()
                    .map_err(|err| SqliteStoreError::Db(format!("create_analysis commit failed: {err}")))?;

                let mut analysis = connection
                    .query_row(
                        "SELECT * FROM code_analysis WHERE id = ?1",
                        params![analysis_id],
                        mapping::code_analysis_from_row,
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("create_analysis reload failed: {err}")))?;
                analysis.issues = load_issues(connection, analysis.id)?;
                Ok(analysis)
            })
            .map_err(StoreError::from)
    }

    fn get_or_create_branch(
        &self,
        project_id: ProjectId,
        branch_name: &BranchName,
        commit_hash: &CommitHash,
    ) -> Result<Branch, StoreError> {
        let branch_name = branch_name.clone();
        let commit_hash = commit_hash.clone();
        self.writer
            .submit(move |connection| {
                let existing = connection
                    .query_row(
                        "SELECT * FROM branch WHERE project_id = ?1 AND branch_name = ?2",
                        params![i64::try_from(project_id.get()).unwrap_or(i64::MAX), branch_name.as_str()],
                        mapping::branch_from_row,
                    )
                    .optional()
                    .map_err(|err| SqliteStoreError::Db(format!("get_or_create_branch lookup failed: {err}")))?;

                if let Some(branch) = existing {
                    return Ok(branch);
                }

                connection
                    .execute(
                        "INSERT INTO branch (
                            project_id, branch_name, commit_hash, last_successful_commit_hash,
                            health_status, consecutive_failures, last_health_check_at,
                            total_issues, high_severity_count, medium_severity_count,
                            low_severity_count, info_severity_count, resolved_count
                        ) VALUES (?1, ?2, ?3, NULL, 'UNKNOWN', 0, NULL, 0, 0, 0, 0, 0, 0)",
                        params![
                            i64::try_from(project_id.get()).unwrap_or(i64::MAX),
                            branch_name.as_str(),
                            commit_hash.as_str(),
                        ],
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("get_or_create_branch insert failed: {err}")))?;
                let id = connection.last_insert_rowid();

                connection
                    .query_row(
                        "SELECT * FROM branch WHERE id = ?1",
                        params![id],
                        mapping::branch_from_row,
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("get_or_create_branch reload failed: {err}")))
            })
            .map_err(StoreError::from)
    }

    fn update_branch_commit(
        &self,
        branch_id: BranchId,
        commit_hash: &CommitHash,
    ) -> Result<(), StoreError> {
        let commit_hash = commit_hash.clone();
        self.writer
            .submit(move |connection| {
                connection
                    .execute(
                        "UPDATE branch SET commit_hash = ?2 WHERE id = ?1",
                        params![i64::try_from(branch_id.get()).unwrap_or(i64::MAX), commit_hash.as_str()],
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("update_branch_commit failed: {err}")))?;
                Ok(())
            })
            .map_err(StoreError::from)
    }

    fn save_branch_counters(&self, branch: &Branch) -> Result<(), StoreError> {
        let branch = branch.clone();
        self.writer
            .submit(move |connection| {
                connection
                    .execute(
                        "UPDATE branch SET
                            health_status = ?2, consecutive_failures = ?3, last_health_check_at = ?4,
                            last_successful_commit_hash = ?5,
                            total_issues = ?6, high_severity_count = ?7, medium_severity_count = ?8,
                            low_severity_count = ?9, info_severity_count = ?10, resolved_count = ?11
                        WHERE id = ?1",
                        params![
                            i64::try_from(branch.id.get()).unwrap_or(i64::MAX),
                            mapping::health_status_to_text(branch.health_status),
                            branch.consecutive_failures,
                            branch.last_health_check_at,
                            branch.last_successful_commit_hash.as_ref().map(CommitHash::as_str),
                            branch.counters.total_issues,
                            branch.counters.high_severity_count,
                            branch.counters.medium_severity_count,
                            branch.counters.low_severity_count,
                            branch.counters.info_severity_count,
                            branch.counters.resolved_count,
                        ],
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("save_branch_counters failed: {err}")))?;
                Ok(())
            })
            .map_err(StoreError::from)
    }

    fn set_default_branch_if_unset(
        &self,
        project_id: ProjectId,
        branch_name: &BranchName,
    ) -> Result<(), StoreError> {
        let branch_name = branch_name.clone();
        self.writer
            .submit(move |connection| {
                connection
                    .execute(
                        "UPDATE project SET default_branch = ?2 WHERE id = ?1 AND default_branch IS NULL",
                        params![i64::try_from(project_id.get()).unwrap_or(i64::MAX), branch_name.as_str()],
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("set_default_branch_if_unset failed: {err}")))?;
                Ok(())
            })
            .map_err(StoreError::from)
    }

    fn upsert_branch_file(
        &self,
        project_id: ProjectId,
        branch_name: &BranchName,
        file_path: &FilePath,
        issue_count: u32,
    ) -> Result<BranchFile, StoreError> {
        let branch_name = branch_name.clone();
        let file_path = file_path.clone();
        self.writer
            .submit(move |connection| {
                connection
                    .execute(
                        "INSERT INTO branch_file (project_id, branch_name, file_path, issue_count)
                            VALUES (?1, ?2, ?3, ?4)
                            ON CONFLICT(project_id, branch_name, file_path)
                            DO UPDATE SET issue_count = excluded.issue_count",
                        params![
                            i64::try_from(project_id.get()).unwrap_or(i64::MAX),
                            branch_name.as_str(),
                            file_path.as_str(),
                            issue_count,
                        ],
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("upsert_branch_file failed: {err}")))?;
                connection
                    .query_row(
                        "SELECT * FROM branch_file WHERE project_id = ?1 AND branch_name = ?2 AND file_path = ?3",
                        params![
                            i64::try_from(project_id.get()).unwrap_or(i64::MAX),
                            branch_name.as_str(),
                            file_path.as_str()
                        ],
                        mapping::branch_file_from_row,
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("upsert_branch_file reload failed: {err}")))
            })
            .map_err(StoreError::from)
    }

    fn qualifying_issues_for_branch(
        &self,
        project_id: ProjectId,
        branch_name: &BranchName,
        file_paths: &[FilePath],
    ) -> Result<Vec<CodeAnalysisIssue>, StoreError> {
        if file_paths.is_empty() {
            return Ok(Vec::new());
        }
        let branch_name = branch_name.clone();
        let file_paths: Vec<String> = file_paths.iter().map(|path| path.as_str().to_string()).collect();
        self.with_read(|connection| {
            let placeholders = std::iter::repeat_n("?", file_paths.len())
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT cai.* FROM code_analysis_issue cai
                    JOIN code_analysis ca ON ca.id = cai.code_analysis_id
                    WHERE ca.project_id = ? AND (ca.branch_name = ? OR ca.source_branch_name = ?)
                    AND cai.file_path IN ({placeholders})"
            );
            let mut statement = connection
                .prepare(&sql)
                .map_err(|err| SqliteStoreError::Db(format!("qualifying_issues_for_branch prepare failed: {err}")))?;

            let mut bound: Vec<Box<dyn rusqlite::ToSql>> = vec![
                Box::new(i64::try_from(project_id.get()).unwrap_or(i64::MAX)),
                Box::new(branch_name.as_str().to_string()),
                Box::new(branch_name.as_str().to_string()),
            ];
            for path in &file_paths {
                bound.push(Box::new(path.clone()));
            }
            let param_refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|value| value.as_ref()).collect();

            let rows = statement
                .query_map(param_refs.as_slice(), mapping::code_analysis_issue_from_row)
                .map_err(|err| SqliteStoreError::Db(format!("qualifying_issues_for_branch query failed: {err}")))?;
            let mut issues = Vec::new();
            for row in rows {
                issues.push(row.map_err(|err| {
                    SqliteStoreError::Db(format!("qualifying_issues_for_branch row failed: {err}"))
                })?);
            }
            Ok(issues)
        })
        .map_err(StoreError::from)
    }

    fn upsert_branch_issue(
        &self,
        branch_id: BranchId,
        issue: &CodeAnalysisIssue,
        first_detected_pr_number: Option<PrNumber>,
    ) -> Result<BranchIssue, StoreError> {
        let issue = issue.clone();
        self.writer
            .submit(move |connection| {
                connection
                    .execute(
                        "INSERT INTO branch_issue (
                            branch_id, code_analysis_issue_id, file_path, severity, resolved,
                            first_detected_pr_number, resolved_in_pr_number, resolved_in_commit_hash,
                            resolved_description, resolved_at, resolved_by
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, NULL, NULL, NULL, NULL)
                        ON CONFLICT(branch_id, code_analysis_issue_id)
                        DO UPDATE SET severity = excluded.severity, file_path = excluded.file_path",
                        params![
                            i64::try_from(branch_id.get()).unwrap_or(i64::MAX),
                            i64::try_from(issue.id.get()).unwrap_or(i64::MAX),
                            issue.file_path.as_str(),
                            mapping::severity_to_text(issue.severity),
                            issue.resolved,
                            first_detected_pr_number
                                .map(|value| i64::try_from(value.get()).unwrap_or(i64::MAX)),
                        ],
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("upsert_branch_issue failed: {err}")))?;

                connection
                    .query_row(
                        "SELECT * FROM branch_issue WHERE branch_id = ?1 AND code_analysis_issue_id = ?2",
                        params![
                            i64::try_from(branch_id.get()).unwrap_or(i64::MAX),
                            i64::try_from(issue.id.get()).unwrap_or(i64::MAX)
                        ],
                        mapping::branch_issue_from_row,
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("upsert_branch_issue reload failed: {err}")))
            })
            .map_err(StoreError::from)
    }

    fn list_branch_issues(&self, branch_id: BranchId) -> Result<Vec<BranchIssue>, StoreError> {
        self.with_read(|connection| {
            let mut statement = connection
                .prepare("SELECT * FROM branch_issue WHERE branch_id = ?1 ORDER BY id")
                .map_err(|err| SqliteStoreError::Db(format!("list_branch_issues prepare failed: {err}")))?;
            let rows = statement
                .query_map(
                    params![i64::try_from(branch_id.get()).unwrap_or(i64::MAX)],
                    mapping::branch_issue_from_row,
                )
                .map_err(|err| SqliteStoreError::Db(format!("list_branch_issues query failed: {err}")))?;
            let mut issues = Vec::new();
            for row in rows {
                issues
                    .push(row.map_err(|err| SqliteStoreError::Db(format!("list_branch_issues row failed: {err}")))?);
            }
            Ok(issues)
        })
        .map_err(StoreError::from)
    }

    fn resolve_branch_issue_by_commit(
        &self,
        branch_issue_id: BranchIssueId,
        commit_hash: &CommitHash,
        resolved_at: i64,
    ) -> Result<(), StoreError> {
        let commit_hash = commit_hash.clone();
        self.writer
            .submit(move |connection| {
                let transaction = connection
                    .unchecked_transaction()
                    .map_err(|err| SqliteStoreError::Db(format!("resolve_branch_issue_by_commit begin failed: {err}")))?;

                transaction
                    .execute(
                        "UPDATE branch_issue SET resolved = 1, resolved_in_commit_hash = ?2, resolved_at = ?3
                            WHERE id = ?1",
                        params![
                            i64::try_from(branch_issue_id.get()).unwrap_or(i64::MAX),
                            commit_hash.as_str(),
                            resolved_at,
                        ],
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("resolve_branch_issue_by_commit update failed: {err}")))?;

                let code_analysis_issue_id: i64 = transaction
                    .query_row(
                        "SELECT code_analysis_issue_id FROM branch_issue WHERE id = ?1",
                        params![i64::try_from(branch_issue_id.get()).unwrap_or(i64::MAX)],
                        |row| row.get(0),
                    )
                    .map_err(|err| {
                        SqliteStoreError::NotFound(format!("branch_issue {branch_issue_id} not found: {err}"))
                    })?;

                transaction
                    .execute(
                        "UPDATE code_analysis_issue SET resolved = 1 WHERE id = ?1",
                        params![code_analysis_issue_id],
                    )
                    .map_err(|err| {
                        SqliteStoreError::Db(format!("resolve_branch_issue_by_commit issue update failed: {err}"))
                    })?;

                transaction
                    .commit()
                    .map_err(|err| SqliteStoreError::Db(format!("resolve_branch_issue_by_commit commit failed: {err}")))?;
                Ok(())
            })
            .map_err(StoreError::from)
    }
}

fn insert_issue(
    connection: &Connection,
    analysis_id: i64,
    finding: &AiFinding,
) -> Result<(), SqliteStoreError> {
    connection
        .execute(
            "INSERT INTO code_analysis_issue (
                code_analysis_id, file_path, line_number, severity, reason,
                suggested_fix_description, resolved
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                analysis_id,
                finding.file_path.as_str(),
                finding.line_number,
                mapping::severity_to_text(finding.severity),
                finding.reason,
                finding.suggested_fix_description,
            ],
        )
        .map_err(|err| SqliteStoreError::Db(format!("insert_issue failed: {err}")))?;
    Ok(())
}

fn load_issues(
    connection: &Connection,
    analysis_id: CodeAnalysisId,
) -> Result<Vec<CodeAnalysisIssue>, SqliteStoreError> {
    let mut statement = connection
        .prepare("SELECT * FROM code_analysis_issue WHERE code_analysis_id = ?1 ORDER BY id")
        .map_err(|err| SqliteStoreError::Db(format!("load_issues prepare failed: {err}")))?;
    let rows = statement
        .query_map(
            params![i64::try_from(analysis_id.get()).unwrap_or(i64::MAX)],
            mapping::code_analysis_issue_from_row,
        )
        .map_err(|err| SqliteStoreError::Db(format!("load_issues query failed: {err}")))?;
    let mut issues = Vec::new();
    for row in rows {
        issues.push(row.map_err(|err| SqliteStoreError::Db(format!("load_issues row failed: {err}")))?);
    }
    Ok(issues)
}

// ============================================================================
// SECTION: LockService
// ============================================================================

impl LockService for SqliteStore {
    fn acquire(
        &self,
        project_id: ProjectId,
        branch: &BranchName,
        analysis_type: AnalysisType,
        commit_hash: Option<&CommitHash>,
        pr_number: Option<PrNumber>,
    ) -> Result<AcquireOutcome, LockError> {
        let branch = branch.clone();
        let commit_hash = commit_hash.cloned();
        let lock_key = LockKey::new(format!(
            "{project_id}:{branch}:{}:{}",
            mapping::analysis_type_to_text(analysis_type),
            uuid::Uuid::new_v4()
        ));
        let lock_key_for_insert = lock_key.clone();
        let acquired = self
            .writer
            .submit(move |connection| {
                let now = now_millis();
                let expires_at = now + i64::try_from(default_lock_ttl(analysis_type).as_millis()).unwrap_or(i64::MAX);

                // Proactively clear any already-expired row for this key tuple
                // so a lagging `sweep_expired` run never causes false
                // contention here (see DESIGN.md for the reconciliation
                // between this and the literal delete-based contract text).
                connection
                    .execute(
                        "DELETE FROM analysis_lock WHERE project_id = ?1 AND branch_name = ?2
                            AND analysis_type = ?3 AND expires_at < ?4",
                        params![
                            i64::try_from(project_id.get()).unwrap_or(i64::MAX),
                            branch.as_str(),
                            mapping::analysis_type_to_text(analysis_type),
                            now,
                        ],
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("acquire expired cleanup failed: {err}")))?;

                let insert_result = connection.execute(
                    "INSERT INTO analysis_lock (
                        lock_key, project_id, branch_name, analysis_type, commit_hash, pr_number,
                        acquired_at, expires_at, active
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)",
                    params![
                        lock_key_for_insert.as_str(),
                        i64::try_from(project_id.get()).unwrap_or(i64::MAX),
                        branch.as_str(),
                        mapping::analysis_type_to_text(analysis_type),
                        commit_hash.as_ref().map(CommitHash::as_str),
                        pr_number.map(|value| i64::try_from(value.get()).unwrap_or(i64::MAX)),
                        now,
                        expires_at,
                    ],
                );

                match insert_result {
                    Ok(_) => Ok(true),
                    Err(rusqlite::Error::SqliteFailure(error, _))
                        if error.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        Ok(false)
                    }
                    Err(err) => Err(SqliteStoreError::Db(format!("acquire insert failed: {err}"))),
                }
            })
            .map_err(LockError::from)?;

        Ok(AcquireOutcome { lock_key, acquired })
    }

    fn acquire_with_wait(
        &self,
        project_id: ProjectId,
        branch: &BranchName,
        analysis_type: AnalysisType,
        commit_hash: Option<&CommitHash>,
        pr_number: Option<PrNumber>,
        poll_interval: Duration,
        max_wait: Duration,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<Option<LockKey>, LockError> {
        let deadline = SystemTime::now() + max_wait;
        let start = SystemTime::now();
        loop {
            if cancel.is_cancelled() {
                return Err(LockError::Cancelled);
            }
            let outcome = self.acquire(project_id, branch, analysis_type, commit_hash, pr_number)?;
            if outcome.acquired {
                return Ok(Some(outcome.lock_key));
            }
            if SystemTime::now() >= deadline {
                return Ok(None);
            }
            let elapsed_secs = SystemTime::now()
                .duration_since(start)
                .map(|duration| duration.as_secs())
                .unwrap_or(0);
            sink.accept(AnalysisEvent::LockWaiting { elapsed_secs });
            std::thread::sleep(poll_interval.min(deadline.duration_since(SystemTime::now()).unwrap_or_default()));
        }
    }

    fn release(&self, lock_key: &LockKey) -> Result<(), LockError> {
        let lock_key = lock_key.clone();
        self.writer
            .submit(move |connection| {
                connection
                    .execute(
                        "DELETE FROM analysis_lock WHERE lock_key = ?1",
                        params![lock_key.as_str()],
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("release failed: {err}")))?;
                Ok(())
            })
            .map_err(LockError::from)
    }

    fn sweep_expired(&self) -> Result<u64, LockError> {
        self.writer
            .submit(|connection| {
                let now = now_millis();
                let deleted = connection
                    .execute("DELETE FROM analysis_lock WHERE expires_at < ?1", params![now])
                    .map_err(|err| SqliteStoreError::Db(format!("sweep_expired failed: {err}")))?;
                Ok(u64::try_from(deleted).unwrap_or(0))
            })
            .map_err(LockError::from)
    }
}

// ============================================================================
// SECTION: JobRecorder
// ============================================================================

impl JobRecorder for SqliteStore {
    fn create_job(
        &self,
        project_id: ProjectId,
        analysis_type: AnalysisType,
        trigger_source: TriggerSource,
    ) -> Result<JobId, JobRecorderError> {
        self.writer
            .submit(move |connection| {
                let now = now_millis();
                connection
                    .execute(
                        "INSERT INTO job_record (
                            project_id, analysis_type, trigger_source, stage, created_at,
                            completed_at, outcome, summary, failure_reason
                        ) VALUES (?1, ?2, ?3, 'created', ?4, NULL, 'RUNNING', NULL, NULL)",
                        params![
                            i64::try_from(project_id.get()).unwrap_or(i64::MAX),
                            mapping::analysis_type_to_text(analysis_type),
                            mapping::trigger_source_to_text(trigger_source),
                            now,
                        ],
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("create_job failed: {err}")))?;
                let id = connection.last_insert_rowid();
                JobId::from_raw(u64::try_from(id).unwrap_or_default())
                    .ok_or_else(|| SqliteStoreError::Db("create_job produced a zero rowid".to_string()))
            })
            .map_err(JobRecorderError::from)
    }

    fn info(&self, job_id: JobId, stage: &str, message: &str) -> Result<(), JobRecorderError> {
        self.append_log(job_id, revguard_core::LogLevel::Info, stage, message)
    }

    fn warn(&self, job_id: JobId, stage: &str, message: &str) -> Result<(), JobRecorderError> {
        self.append_log(job_id, revguard_core::LogLevel::Warn, stage, message)
    }

    fn error(&self, job_id: JobId, stage: &str, message: &str) -> Result<(), JobRecorderError> {
        self.append_log(job_id, revguard_core::LogLevel::Error, stage, message)
    }

    fn complete_job(&self, job_id: JobId, summary: Option<&str>) -> Result<(), JobRecorderError> {
        let summary = summary.map(str::to_string);
        self.writer
            .submit(move |connection| {
                let now = now_millis();
                connection
                    .execute(
                        "UPDATE job_record SET outcome = 'SUCCEEDED', completed_at = ?2, summary = ?3
                            WHERE id = ?1",
                        params![i64::try_from(job_id.get()).unwrap_or(i64::MAX), now, summary],
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("complete_job failed: {err}")))?;
                Ok(())
            })
            .map_err(JobRecorderError::from)
    }

    fn fail_job(&self, job_id: JobId, reason: &str) -> Result<(), JobRecorderError> {
        let reason = reason.to_string();
        self.writer
            .submit(move |connection| {
                let now = now_millis();
                connection
                    .execute(
                        "UPDATE job_record SET outcome = 'FAILED', completed_at = ?2, failure_reason = ?3
                            WHERE id = ?1",
                        params![i64::try_from(job_id.get()).unwrap_or(i64::MAX), now, reason],
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("fail_job failed: {err}")))?;
                Ok(())
            })
            .map_err(JobRecorderError::from)
    }
}

impl SqliteStore {
    fn append_log(
        &self,
        job_id: JobId,
        level: revguard_core::LogLevel,
        stage: &str,
        message: &str,
    ) -> Result<(), JobRecorderError> {
        let stage = stage.to_string();
        let message = message.to_string();
        self.writer
            .submit(move |connection| {
                let now = now_millis();
                connection
                    .execute(
                        "UPDATE job_record SET stage = ?2 WHERE id = ?1",
                        params![i64::try_from(job_id.get()).unwrap_or(i64::MAX), stage],
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("append_log stage update failed: {err}")))?;
                connection
                    .execute(
                        "INSERT INTO job_log_entry (job_id, level, stage, message, at) VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            i64::try_from(job_id.get()).unwrap_or(i64::MAX),
                            mapping::log_level_to_text(level),
                            stage,
                            message,
                            now,
                        ],
                    )
                    .map_err(|err| SqliteStoreError::Db(format!("append_log insert failed: {err}")))?;
                Ok(())
            })
            .map_err(JobRecorderError::from)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]
mod tests {
    use super::*;
    use revguard_core::AiBinding;
    use revguard_core::CommentCommandsConfig;
    use revguard_core::ProjectConfig;
    use revguard_core::RagConfig;
    use revguard_core::Severity;
    use revguard_core::VcsConnection;
    use revguard_core::VcsProvider;
    use revguard_core::job::TriggerSource as Trigger;

    fn sample_project() -> Project {
        Project {
            id: ProjectId::from_raw(1).expect("non-zero"),
            name: "demo".to_string(),
            namespace: "acme".to_string(),
            workspace_ref: "ws-1".to_string(),
            vcs_connection: VcsConnection {
                provider: VcsProvider::Github,
                workspace: "acme".to_string(),
                repo_slug: "demo".to_string(),
            },
            ai_binding: Some(AiBinding {
                base_url: "https://ai.example".to_string(),
                use_local_mcp: false,
            }),
            default_branch: None,
            config: ProjectConfig {
                pr_analysis_enabled: true,
                branch_analysis_enabled: true,
                rag_config: RagConfig {
                    enabled: false,
                    base_url: None,
                },
                comment_commands_config: CommentCommandsConfig {
                    enabled: true,
                    prefix: "/revguard".to_string(),
                },
            },
        }
    }

    fn open_temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("revguard.db");
        let store = SqliteStore::open(&path).expect("open store");
        (dir, store)
    }

    #[test]
    fn seeded_project_round_trips() {
        let (_dir, store) = open_temp_store();
        let project = sample_project();
        store.seed_project(&project).expect("seed project");
        let loaded = store.get_project(project.id).expect("get_project").expect("present");
        assert_eq!(loaded, project);
    }

    #[test]
    fn create_analysis_persists_issues_and_is_findable_by_cache_key() {
        let (_dir, store) = open_temp_store();
        let project = sample_project();
        store.seed_project(&project).expect("seed project");

        let analysis = store
            .create_analysis(NewCodeAnalysis {
                project_id: project.id,
                analysis_type: AnalysisType::PrAnalysis,
                pr_number: PrNumber::from_raw(7),
                branch_name: BranchName::from("main"),
                source_branch_name: Some(BranchName::from("feat/x")),
                commit_hash: CommitHash::new("abc123"),
                pr_version: 1,
                issues: vec![AiFinding {
                    issue_id: None,
                    file_path: FilePath::from("src/lib.rs"),
                    line_number: Some(10),
                    severity: Severity::High,
                    reason: "missing bounds check".to_string(),
                    suggested_fix_description: None,
                }],
            })
            .expect("create_analysis");
        assert_eq!(analysis.issues.len(), 1);

        let found = store
            .find_accepted_analysis(project.id, &CommitHash::new("abc123"), PrNumber::from_raw(7))
            .expect("find_accepted_analysis")
            .expect("present");
        assert_eq!(found.id, analysis.id);
        assert_eq!(found.issues.len(), 1);
    }

    #[test]
    fn acquire_is_exclusive_until_released() {
        let (_dir, store) = open_temp_store();
        let project_id = ProjectId::from_raw(1).expect("non-zero");
        let branch = BranchName::from("main");

        let first = store
            .acquire(project_id, &branch, AnalysisType::BranchAnalysis, None, None)
            .expect("first acquire");
        assert!(first.acquired);

        let second = store
            .acquire(project_id, &branch, AnalysisType::BranchAnalysis, None, None)
            .expect("second acquire");
        assert!(!second.acquired);

        store.release(&first.lock_key).expect("release");

        let third = store
            .acquire(project_id, &branch, AnalysisType::BranchAnalysis, None, None)
            .expect("third acquire");
        assert!(third.acquired);
    }

    #[test]
    fn job_recorder_tracks_lifecycle() {
        let (_dir, store) = open_temp_store();
        let project_id = ProjectId::from_raw(1).expect("non-zero");
        let job_id = store
            .create_job(project_id, AnalysisType::PrAnalysis, Trigger::Manual)
            .expect("create_job");
        store.info(job_id, "lock_acquire", "acquired lock").expect("info");
        store.complete_job(job_id, Some("no issues found")).expect("complete_job");
    }
}
