// crates/revguard-store-sqlite/src/mapping.rs
// ============================================================================
// Module: Revguard SQLite Row Mapping
// Description: Conversions between SQLite rows and the domain entities
//   defined in revguard-core.
// Purpose: Keep the text encoding of every enum, and the column layout of
//   every table, in one place rather than scattered across the store's
//   query methods.
// Dependencies: revguard-core, rusqlite
// ============================================================================

use std::num::NonZeroU64;

use rusqlite::Row;

use revguard_core::AiBinding;
use revguard_core::AnalysisLock;
use revguard_core::AnalysisStatus;
use revguard_core::AnalysisType;
use revguard_core::Branch;
use revguard_core::BranchCounters;
use revguard_core::BranchFile;
use revguard_core::BranchId;
use revguard_core::BranchIssue;
use revguard_core::BranchIssueId;
use revguard_core::BranchName;
use revguard_core::CodeAnalysis;
use revguard_core::CodeAnalysisId;
use revguard_core::CodeAnalysisIssue;
use revguard_core::CodeAnalysisIssueId;
use revguard_core::CommentCommandsConfig;
use revguard_core::CommitHash;
use revguard_core::FilePath;
use revguard_core::HealthStatus;
use revguard_core::JobId;
use revguard_core::JobLogEntry;
use revguard_core::JobOutcome;
use revguard_core::JobRecord;
use revguard_core::LockKey;
use revguard_core::LogLevel;
use revguard_core::PrNumber;
use revguard_core::Project;
use revguard_core::ProjectConfig;
use revguard_core::ProjectId;
use revguard_core::PullRequest;
use revguard_core::PullRequestId;
use revguard_core::RagConfig;
use revguard_core::Severity;
use revguard_core::TriggerSource;
use revguard_core::VcsConnection;
use revguard_core::VcsProvider;

use crate::error::SqliteStoreError;

// ============================================================================
// SECTION: Enum <-> text
// ============================================================================

pub(crate) fn analysis_type_to_text(value: AnalysisType) -> &'static str {
    match value {
        AnalysisType::PrAnalysis => "PR_ANALYSIS",
        AnalysisType::BranchAnalysis => "BRANCH_ANALYSIS",
        AnalysisType::RagIndexing => "RAG_INDEXING",
    }
}

pub(crate) fn analysis_type_from_text(value: &str) -> Result<AnalysisType, SqliteStoreError> {
    match value {
        "PR_ANALYSIS" => Ok(AnalysisType::PrAnalysis),
        "BRANCH_ANALYSIS" => Ok(AnalysisType::BranchAnalysis),
        "RAG_INDEXING" => Ok(AnalysisType::RagIndexing),
        other => Err(SqliteStoreError::Db(format!(
            "unknown analysis_type in row: {other}"
        ))),
    }
}

pub(crate) fn analysis_status_to_text(value: AnalysisStatus) -> &'static str {
    match value {
        AnalysisStatus::Pending => "PENDING",
        AnalysisStatus::Running => "RUNNING",
        AnalysisStatus::Accepted => "ACCEPTED",
        AnalysisStatus::Failed => "FAILED",
    }
}

pub(crate) fn analysis_status_from_text(value: &str) -> Result<AnalysisStatus, SqliteStoreError> {
    match value {
        "PENDING" => Ok(AnalysisStatus::Pending),
        "RUNNING" => Ok(AnalysisStatus::Running),
        "ACCEPTED" => Ok(AnalysisStatus::Accepted),
        "FAILED" => Ok(AnalysisStatus::Failed),
        other => Err(SqliteStoreError::Db(format!(
            "unknown analysis status in row: {other}"
        ))),
    }
}

pub(crate) fn severity_to_text(value: Severity) -> &'static str {
    match value {
        Severity::Info => "INFO",
        Severity::Low => "LOW",
        Severity::Medium => "MEDIUM",
        Severity::High => "HIGH",
    }
}

pub(crate) fn severity_from_text(value: &str) -> Result<Severity, SqliteStoreError> {
    match value {
        "INFO" => Ok(Severity::Info),
        "LOW" => Ok(Severity::Low),
        "MEDIUM" => Ok(Severity::Medium),
        "HIGH" => Ok(Severity::High),
        other => Err(SqliteStoreError::Db(format!(
            "unknown severity in row: {other}"
        ))),
    }
}

pub(crate) fn health_status_to_text(value: HealthStatus) -> &'static str {
    match value {
        HealthStatus::Unknown => "UNKNOWN",
        HealthStatus::Healthy => "HEALTHY",
        HealthStatus::Stale => "STALE",
    }
}

pub(crate) fn health_status_from_text(value: &str) -> Result<HealthStatus, SqliteStoreError> {
    match value {
        "UNKNOWN" => Ok(HealthStatus::Unknown),
        "HEALTHY" => Ok(HealthStatus::Healthy),
        "STALE" => Ok(HealthStatus::Stale),
        other => Err(SqliteStoreError::Db(format!(
            "unknown health_status in row: {other}"
        ))),
    }
}

pub(crate) fn vcs_provider_to_text(value: VcsProvider) -> &'static str {
    match value {
        VcsProvider::Github => "GITHUB",
        VcsProvider::Gitlab => "GITLAB",
        VcsProvider::BitbucketCloud => "BITBUCKET_CLOUD",
    }
}

pub(crate) fn vcs_provider_from_text(value: &str) -> Result<VcsProvider, SqliteStoreError> {
    match value {
        "GITHUB" => Ok(VcsProvider::Github),
        "GITLAB" => Ok(VcsProvider::Gitlab),
        "BITBUCKET_CLOUD" => Ok(VcsProvider::BitbucketCloud),
        other => Err(SqliteStoreError::Db(format!(
            "unknown vcs_provider in row: {other}"
        ))),
    }
}

pub(crate) fn trigger_source_to_text(value: TriggerSource) -> &'static str {
    match value {
        TriggerSource::PullRequestEvent => "PULL_REQUEST_EVENT",
        TriggerSource::PushEvent => "PUSH_EVENT",
        TriggerSource::Manual => "MANUAL",
    }
}

pub(crate) fn trigger_source_from_text(value: &str) -> Result<TriggerSource, SqliteStoreError> {
    match value {
        "PULL_REQUEST_EVENT" => Ok(TriggerSource::PullRequestEvent),
        "PUSH_EVENT" => Ok(TriggerSource::PushEvent),
        "MANUAL" => Ok(TriggerSource::Manual),
        other => Err(SqliteStoreError::Db(format!(
            "unknown trigger_source in row: {other}"
        ))),
    }
}

pub(crate) fn job_outcome_to_text(value: JobOutcome) -> &'static str {
    match value {
        JobOutcome::Running => "RUNNING",
        JobOutcome::Succeeded => "SUCCEEDED",
        JobOutcome::Failed => "FAILED",
    }
}

pub(crate) fn job_outcome_from_text(value: &str) -> Result<JobOutcome, SqliteStoreError> {
    match value {
        "RUNNING" => Ok(JobOutcome::Running),
        "SUCCEEDED" => Ok(JobOutcome::Succeeded),
        "FAILED" => Ok(JobOutcome::Failed),
        other => Err(SqliteStoreError::Db(format!(
            "unknown job outcome in row: {other}"
        ))),
    }
}

pub(crate) fn log_level_to_text(value: LogLevel) -> &'static str {
    match value {
        LogLevel::Info => "INFO",
        LogLevel::Warn => "WARN",
        LogLevel::Error => "ERROR",
    }
}

pub(crate) fn log_level_from_text(value: &str) -> Result<LogLevel, SqliteStoreError> {
    match value {
        "INFO" => Ok(LogLevel::Info),
        "WARN" => Ok(LogLevel::Warn),
        "ERROR" => Ok(LogLevel::Error),
        other => Err(SqliteStoreError::Db(format!(
            "unknown log level in row: {other}"
        ))),
    }
}

// ============================================================================
// SECTION: Identifier conversion
// ============================================================================

/// Wraps a rowid column value in a `NonZeroU64`-backed identifier, surfacing
/// the zero-or-negative case as a row-conversion error rather than panicking
/// — every id column in this schema is an `INTEGER PRIMARY KEY` rowid, which
/// SQLite never assigns as zero, but the conversion is still fallible at the
/// type level and must be handled as such.
fn positive_id<T>(
    raw: i64,
    ctor: impl Fn(NonZeroU64) -> T,
    column: &'static str,
) -> rusqlite::Result<T> {
    let value = u64::try_from(raw).unwrap_or(0);
    NonZeroU64::new(value).map(ctor).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Integer,
            Box::new(SqliteStoreError::Db(format!(
                "{column} was not a positive rowid: {raw}"
            ))),
        )
    })
}

// ============================================================================
// SECTION: Row -> entity
// ============================================================================

/// Maps a `project` row (all columns, in schema order) to a [`Project`].
pub(crate) fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    let id: i64 = row.get("id")?;
    let provider_text: String = row.get("vcs_provider")?;
    let provider = vcs_provider_from_text(&provider_text)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err)))?;
    let ai_base_url: Option<String> = row.get("ai_base_url")?;
    let ai_use_local_mcp: Option<bool> = row.get("ai_use_local_mcp")?;
    let default_branch: Option<String> = row.get("default_branch")?;
    let rag_base_url: Option<String> = row.get("rag_base_url")?;

    Ok(Project {
        id: positive_id(id, ProjectId::new, "project.id")?,
        name: row.get("name")?,
        namespace: row.get("namespace")?,
        workspace_ref: row.get("workspace_ref")?,
        vcs_connection: VcsConnection {
            provider,
            workspace: row.get("vcs_workspace")?,
            repo_slug: row.get("vcs_repo_slug")?,
        },
        ai_binding: ai_base_url.map(|base_url| AiBinding {
            base_url,
            use_local_mcp: ai_use_local_mcp.unwrap_or(false),
        }),
        default_branch: default_branch.map(BranchName::from),
        config: ProjectConfig {
            pr_analysis_enabled: row.get("pr_analysis_enabled")?,
            branch_analysis_enabled: row.get("branch_analysis_enabled")?,
            rag_config: RagConfig {
                enabled: row.get("rag_enabled")?,
                base_url: rag_base_url,
            },
            comment_commands_config: CommentCommandsConfig {
                enabled: row.get("comment_commands_enabled")?,
                prefix: row.get("comment_commands_prefix")?,
            },
        },
    })
}

/// Maps a `branch` row to a [`Branch`].
pub(crate) fn branch_from_row(row: &Row<'_>) -> rusqlite::Result<Branch> {
    let id: i64 = row.get("id")?;
    let project_id: i64 = row.get("project_id")?;
    let health_status_text: String = row.get("health_status")?;
    let health_status = health_status_from_text(&health_status_text)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err)))?;
    let consecutive_failures: i64 = row.get("consecutive_failures")?;
    let last_successful_commit_hash: Option<String> = row.get("last_successful_commit_hash")?;

    Ok(Branch {
        id: positive_id(id, BranchId::new, "branch.id")?,
        project_id: positive_id(project_id, ProjectId::new, "branch.project_id")?,
        branch_name: BranchName::from(row.get::<_, String>("branch_name")?),
        commit_hash: CommitHash::new(row.get::<_, String>("commit_hash")?),
        last_successful_commit_hash: last_successful_commit_hash.map(CommitHash::new),
        health_status,
        consecutive_failures: u32::try_from(consecutive_failures).unwrap_or_default(),
        last_health_check_at: row.get("last_health_check_at")?,
        counters: BranchCounters {
            total_issues: row.get::<_, i64>("total_issues")?.try_into().unwrap_or_default(),
            high_severity_count: row
                .get::<_, i64>("high_severity_count")?
                .try_into()
                .unwrap_or_default(),
            medium_severity_count: row
                .get::<_, i64>("medium_severity_count")?
                .try_into()
                .unwrap_or_default(),
            low_severity_count: row
                .get::<_, i64>("low_severity_count")?
                .try_into()
                .unwrap_or_default(),
            info_severity_count: row
                .get::<_, i64>("info_severity_count")?
                .try_into()
                .unwrap_or_default(),
            resolved_count: row.get::<_, i64>("resolved_count")?.try_into().unwrap_or_default(),
        },
    })
}

/// Maps a `branch_issue` row to a [`BranchIssue`].
pub(crate) fn branch_issue_from_row(row: &Row<'_>) -> rusqlite::Result<BranchIssue> {
    let id: i64 = row.get("id")?;
    let branch_id: i64 = row.get("branch_id")?;
    let code_analysis_issue_id: i64 = row.get("code_analysis_issue_id")?;
    let severity_text: String = row.get("severity")?;
    let severity = severity_from_text(&severity_text)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err)))?;
    let first_detected_pr_number: Option<i64> = row.get("first_detected_pr_number")?;
    let resolved_in_pr_number: Option<i64> = row.get("resolved_in_pr_number")?;
    let resolved_in_commit_hash: Option<String> = row.get("resolved_in_commit_hash")?;

    Ok(BranchIssue {
        id: positive_id(id, BranchIssueId::new, "branch_issue.id")?,
        branch_id: positive_id(branch_id, BranchId::new, "branch_issue.branch_id")?,
        code_analysis_issue_id: positive_id(
            code_analysis_issue_id,
            CodeAnalysisIssueId::new,
            "branch_issue.code_analysis_issue_id",
        )?,
        file_path: FilePath::from(row.get::<_, String>("file_path")?),
        severity,
        resolved: row.get("resolved")?,
        first_detected_pr_number: first_detected_pr_number
            .and_then(|value| PrNumber::from_raw(u64::try_from(value).unwrap_or_default())),
        resolved_in_pr_number: resolved_in_pr_number
            .and_then(|value| PrNumber::from_raw(u64::try_from(value).unwrap_or_default())),
        resolved_in_commit_hash: resolved_in_commit_hash.map(CommitHash::new),
        resolved_description: row.get("resolved_description")?,
        resolved_at: row.get("resolved_at")?,
        resolved_by: row.get("resolved_by")?,
    })
}

/// Maps a `branch_file` row to a [`BranchFile`].
pub(crate) fn branch_file_from_row(row: &Row<'_>) -> rusqlite::Result<BranchFile> {
    let id: i64 = row.get("id")?;
    let project_id: i64 = row.get("project_id")?;
    let issue_count: i64 = row.get("issue_count")?;

    Ok(BranchFile {
        id: positive_id(id, revguard_core::BranchFileId::new, "branch_file.id")?,
        project_id: positive_id(project_id, ProjectId::new, "branch_file.project_id")?,
        branch_name: BranchName::from(row.get::<_, String>("branch_name")?),
        file_path: FilePath::from(row.get::<_, String>("file_path")?),
        issue_count: u32::try_from(issue_count).unwrap_or_default(),
    })
}

/// Maps a `pull_request` row to a [`PullRequest`].
pub(crate) fn pull_request_from_row(row: &Row<'_>) -> rusqlite::Result<PullRequest> {
    let id: i64 = row.get("id")?;
    let project_id: i64 = row.get("project_id")?;
    let pr_number: i64 = row.get("pr_number")?;
    let pr_version: i64 = row.get("pr_version")?;

    Ok(PullRequest {
        id: positive_id(id, PullRequestId::new, "pull_request.id")?,
        project_id: positive_id(project_id, ProjectId::new, "pull_request.project_id")?,
        pr_number: positive_id(pr_number, PrNumber::new, "pull_request.pr_number")?,
        source_branch_name: BranchName::from(row.get::<_, String>("source_branch_name")?),
        target_branch_name: BranchName::from(row.get::<_, String>("target_branch_name")?),
        commit_hash: CommitHash::new(row.get::<_, String>("commit_hash")?),
        pr_version: u32::try_from(pr_version).unwrap_or_default(),
    })
}

/// Maps a `code_analysis` row (without its owned issues) to a [`CodeAnalysis`].
pub(crate) fn code_analysis_from_row(row: &Row<'_>) -> rusqlite::Result<CodeAnalysis> {
    let id: i64 = row.get("id")?;
    let project_id: i64 = row.get("project_id")?;
    let pr_number: Option<i64> = row.get("pr_number")?;
    let source_branch_name: Option<String> = row.get("source_branch_name")?;
    let pr_version: i64 = row.get("pr_version")?;
    let analysis_type_text: String = row.get("analysis_type")?;
    let analysis_type = analysis_type_from_text(&analysis_type_text)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err)))?;
    let status_text: String = row.get("status")?;
    let status = analysis_status_from_text(&status_text)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err)))?;

    Ok(CodeAnalysis {
        id: positive_id(id, CodeAnalysisId::new, "code_analysis.id")?,
        project_id: positive_id(project_id, ProjectId::new, "code_analysis.project_id")?,
        analysis_type,
        pr_number: pr_number
            .and_then(|value| PrNumber::from_raw(u64::try_from(value).unwrap_or_default())),
        branch_name: BranchName::from(row.get::<_, String>("branch_name")?),
        source_branch_name: source_branch_name.map(BranchName::from),
        commit_hash: CommitHash::new(row.get::<_, String>("commit_hash")?),
        pr_version: u32::try_from(pr_version).unwrap_or_default(),
        status,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        issues: Vec::new(),
    })
}

/// Maps a `code_analysis_issue` row to a [`CodeAnalysisIssue`].
pub(crate) fn code_analysis_issue_from_row(row: &Row<'_>) -> rusqlite::Result<CodeAnalysisIssue> {
    let id: i64 = row.get("id")?;
    let code_analysis_id: i64 = row.get("code_analysis_id")?;
    let severity_text: String = row.get("severity")?;
    let severity = severity_from_text(&severity_text)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err)))?;
    let line_number: Option<i64> = row.get("line_number")?;

    Ok(CodeAnalysisIssue {
        id: positive_id(id, CodeAnalysisIssueId::new, "code_analysis_issue.id")?,
        code_analysis_id: positive_id(code_analysis_id, CodeAnalysisId::new, "code_analysis_issue.code_analysis_id")?,
        file_path: FilePath::from(row.get::<_, String>("file_path")?),
        line_number: line_number.map(|value| u32::try_from(value).unwrap_or_default()),
        severity,
        reason: row.get("reason")?,
        suggested_fix_description: row.get("suggested_fix_description")?,
        resolved: row.get("resolved")?,
    })
}

/// Maps an `analysis_lock` row to an [`AnalysisLock`].
pub(crate) fn analysis_lock_from_row(row: &Row<'_>) -> rusqlite::Result<AnalysisLock> {
    let project_id: i64 = row.get("project_id")?;
    let analysis_type_text: String = row.get("analysis_type")?;
    let analysis_type = analysis_type_from_text(&analysis_type_text)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err)))?;
    let commit_hash: Option<String> = row.get("commit_hash")?;
    let pr_number: Option<i64> = row.get("pr_number")?;

    Ok(AnalysisLock {
        lock_key: LockKey::new(row.get::<_, String>("lock_key")?),
        project_id: positive_id(project_id, ProjectId::new, "analysis_lock.project_id")?,
        branch_name: BranchName::from(row.get::<_, String>("branch_name")?),
        analysis_type,
        commit_hash: commit_hash.map(CommitHash::new),
        pr_number: pr_number
            .and_then(|value| PrNumber::from_raw(u64::try_from(value).unwrap_or_default())),
        acquired_at: row.get("acquired_at")?,
        expires_at: row.get("expires_at")?,
    })
}

/// Maps a `job_record` row (without its log entries) to a [`JobRecord`].
pub(crate) fn job_record_from_row(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    let id: i64 = row.get("id")?;
    let project_id: i64 = row.get("project_id")?;
    let analysis_type_text: String = row.get("analysis_type")?;
    let analysis_type = analysis_type_from_text(&analysis_type_text)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err)))?;
    let trigger_source_text: String = row.get("trigger_source")?;
    let trigger_source = trigger_source_from_text(&trigger_source_text)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err)))?;
    let outcome_text: String = row.get("outcome")?;
    let outcome = job_outcome_from_text(&outcome_text)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err)))?;

    Ok(JobRecord {
        id: positive_id(id, JobId::new, "job_record.id")?,
        project_id: positive_id(project_id, ProjectId::new, "job_record.project_id")?,
        analysis_type,
        trigger_source,
        stage: row.get("stage")?,
        created_at: row.get("created_at")?,
        completed_at: row.get("completed_at")?,
        log: Vec::new(),
        outcome,
        summary: row.get("summary")?,
        failure_reason: row.get("failure_reason")?,
    })
}

/// Maps a `job_log_entry` row to a [`JobLogEntry`].
pub(crate) fn job_log_entry_from_row(row: &Row<'_>) -> rusqlite::Result<JobLogEntry> {
    let level_text: String = row.get("level")?;
    let level = log_level_from_text(&level_text)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err)))?;

    Ok(JobLogEntry {
        level,
        stage: row.get("stage")?,
        message: row.get("message")?,
        at: row.get("at")?,
    })
}
