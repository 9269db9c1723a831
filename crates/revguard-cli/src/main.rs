// crates/revguard-cli/src/main.rs
// ============================================================================
// Module: Revguard CLI
// Description: Process entry point wiring the SQLite store, the VCS/AI/RAG
//   HTTP adapters, and both pipelines together for local/manual invocation.
// Purpose: Give an operator (or a thin webhook adapter not itself part of
//   this workspace) one binary to seed a project fixture and drive either
//   processor end to end, over the same capability traits the pipelines
//   depend on in production.
// Dependencies: revguard-ai, revguard-config, revguard-core, revguard-diff,
//   revguard-pipeline, revguard-rag, revguard-store-sqlite, revguard-vcs,
//   clap, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This binary is the one place in the workspace allowed to construct
//! concrete adapters and wire them into the pipelines: every other crate
//! depends only on the `revguard-core` trait objects. Each subcommand reads
//! the shared [`revguard_config::ServiceConfig`], opens the SQLite store,
//! builds the HTTP-backed `VcsOperations`/`AiClient`/`RagOperations`
//! instances, and runs one pipeline to completion, streaming its events as
//! ndjson to stdout.

#![forbid(unsafe_code)]

#[cfg(test)]
mod main_tests;

use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;

use revguard_ai::AiHttpClient;
use revguard_config::ConfigError;
use revguard_config::ServiceConfig;
use revguard_core::AiClient;
use revguard_core::AnalysisStore;
use revguard_core::BranchAnalysisRequest;
use revguard_core::BranchName;
use revguard_core::CancellationToken;
use revguard_core::CommitHash;
use revguard_core::LockService;
use revguard_core::NdjsonEventSink;
use revguard_core::PrAnalysisRequest;
use revguard_core::PrNumber;
use revguard_core::Project;
use revguard_core::ProjectId;
use revguard_core::RagOperations;
use revguard_core::VcsOperations;
use revguard_core::job::TriggerSource;
use revguard_pipeline::BranchAnalysisProcessor;
use revguard_pipeline::PipelineError;
use revguard_pipeline::PrAnalysisProcessor;
use revguard_rag::HttpRagClient;
use revguard_store_sqlite::SqliteStore;
use revguard_store_sqlite::SqliteStoreError;
use revguard_vcs::VcsCredentials;
use revguard_vcs::VcsHttpOperations;

/// Env var carrying the GitHub token handed to [`VcsCredentials`].
const ENV_GITHUB_TOKEN: &str = "REVGUARD_GITHUB_TOKEN";
/// Env var carrying the GitLab token handed to [`VcsCredentials`].
const ENV_GITLAB_TOKEN: &str = "REVGUARD_GITLAB_TOKEN";
/// Env var carrying the Bitbucket Cloud token handed to [`VcsCredentials`].
const ENV_BITBUCKET_TOKEN: &str = "REVGUARD_BITBUCKET_TOKEN";

/// Revguard: the analysis orchestration core, driven manually over a CLI.
#[derive(Debug, Parser)]
#[command(name = "revguard", version, about = "Analysis orchestration core")]
struct Cli {
    /// Path to the service TOML config file.
    #[arg(long, default_value = "revguard.toml")]
    config: PathBuf,
    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// One subcommand per operator-facing action this binary exposes.
#[derive(Debug, Subcommand)]
enum Command {
    /// Seeds a `Project` row from a JSON fixture file, bypassing the
    /// out-of-scope provisioning flow (for manual/local runs and tests).
    SeedProject {
        /// Path to a JSON file deserializing into [`revguard_core::Project`].
        project_json: PathBuf,
    },
    /// Runs the `PrAnalysisProcessor` pipeline for one pull request (§4.5).
    PrAnalysis {
        /// Owning project id.
        #[arg(long)]
        project_id: u64,
        /// Pull request number.
        #[arg(long)]
        pr_number: u64,
        /// Head commit to analyze.
        #[arg(long)]
        commit_hash: String,
        /// Source (head) branch.
        #[arg(long)]
        source_branch: String,
        /// Target (base) branch.
        #[arg(long)]
        target_branch: String,
        /// PR author handle, if known.
        #[arg(long)]
        pr_author: Option<String>,
        /// Existing placeholder comment id to update in place, if any.
        #[arg(long)]
        placeholder_comment_id: Option<String>,
    },
    /// Runs the `BranchAnalysisProcessor` pipeline for one push/merge
    /// (§4.6).
    BranchAnalysis {
        /// Owning project id.
        #[arg(long)]
        project_id: u64,
        /// Branch being reconciled.
        #[arg(long)]
        target_branch: String,
        /// Commit hash of the push/merge.
        #[arg(long)]
        commit_hash: String,
        /// PR number the merge commit originated from, if any.
        #[arg(long)]
        source_pr_number: Option<u64>,
    },
    /// Deletes every expired advisory lock row (§4.1's `sweepExpired`).
    SweepLocks,
}

/// Errors this binary surfaces to the process exit path.
#[derive(Debug, thiserror::Error)]
enum AppError {
    /// The config file could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// The SQLite store could not be opened.
    #[error("store error: {0}")]
    Store(#[from] SqliteStoreError),
    /// A project fixture file could not be read or parsed.
    #[error("failed to read project fixture {path}: {source}")]
    ProjectFixture {
        /// Path that failed to read or parse.
        path: String,
        /// Underlying error text.
        source: String,
    },
    /// The requested project id/PR number was not a valid non-zero value.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    /// The requested project id has no row in the store.
    #[error("project {0} not found")]
    ProjectNotFound(u64),
    /// A VCS/AI/RAG adapter could not be constructed.
    #[error("adapter construction failed: {0}")]
    AdapterInit(String),
    /// A pipeline run failed.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    /// A result could not be rendered as JSON for stdout.
    #[error("failed to render result: {0}")]
    Render(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let mut stderr = io::stderr();
            let _ = writeln!(&mut stderr, "error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let config = ServiceConfig::load(&cli.config)?;
    let store = Arc::new(SqliteStore::open(&config.db_path)?);

    match &cli.command {
        Command::SeedProject { project_json } => seed_project(&store, project_json),
        Command::PrAnalysis {
            project_id,
            pr_number,
            commit_hash,
            source_branch,
            target_branch,
            pr_author,
            placeholder_comment_id,
        } => run_pr_analysis(
            &config,
            &store,
            *project_id,
            *pr_number,
            commit_hash,
            source_branch,
            target_branch,
            pr_author.clone(),
            placeholder_comment_id.clone(),
        ),
        Command::BranchAnalysis { project_id, target_branch, commit_hash, source_pr_number } => {
            run_branch_analysis(&config, &store, *project_id, target_branch, commit_hash, *source_pr_number)
        }
        Command::SweepLocks => sweep_locks(&store),
    }
}

fn seed_project(store: &Arc<SqliteStore>, project_json: &Path) -> Result<(), AppError> {
    let text = fs::read_to_string(project_json)
        .map_err(|err| AppError::ProjectFixture { path: project_json.display().to_string(), source: err.to_string() })?;
    let project: Project = serde_json::from_str(&text)
        .map_err(|err| AppError::ProjectFixture { path: project_json.display().to_string(), source: err.to_string() })?;
    let id = store.seed_project(&project)?;
    print_json(&serde_json::json!({ "seeded_project_id": id.get() }))
}

fn sweep_locks(store: &Arc<SqliteStore>) -> Result<(), AppError> {
    let deleted = store.sweep_expired().map_err(|err| AppError::AdapterInit(err.to_string()))?;
    print_json(&serde_json::json!({ "deleted_locks": deleted }))
}

#[allow(clippy::too_many_arguments)]
fn run_pr_analysis(
    config: &ServiceConfig,
    store: &Arc<SqliteStore>,
    project_id: u64,
    pr_number: u64,
    commit_hash: &str,
    source_branch: &str,
    target_branch: &str,
    pr_author: Option<String>,
    placeholder_comment_id: Option<String>,
) -> Result<(), AppError> {
    let project_id = parse_project_id(project_id)?;
    let pr_number = PrNumber::from_raw(pr_number).ok_or_else(|| AppError::InvalidIdentifier("prNumber must be non-zero".to_string()))?;
    let project = load_project(store, project_id)?;

    let (vcs, ai, rag) = build_adapters(config, &project)?;
    let processor = PrAnalysisProcessor::new(
        vcs,
        ai,
        rag,
        store.clone(),
        store.clone(),
        store.clone(),
        config.lock_timing.poll_interval(),
        config.lock_timing.max_wait(),
    );

    let request = PrAnalysisRequest {
        project_id,
        pr_number,
        commit_hash: CommitHash::new(commit_hash),
        source_branch: BranchName::from(source_branch),
        target_branch: BranchName::from(target_branch),
        pr_author,
        placeholder_comment_id,
        pre_acquired_lock_key: None,
    };

    let sink = NdjsonEventSink::new(io::stdout());
    let cancel = CancellationToken::new();
    let outcome = processor.process(&request, TriggerSource::Manual, &sink, &cancel)?;
    print_json(&serde_json::json!({
        "cached": outcome.cached,
        "analysis_id": outcome.analysis.id.get(),
        "issues_found": outcome.analysis.issues_found(),
    }))
}

fn run_branch_analysis(
    config: &ServiceConfig,
    store: &Arc<SqliteStore>,
    project_id: u64,
    target_branch: &str,
    commit_hash: &str,
    source_pr_number: Option<u64>,
) -> Result<(), AppError> {
    let project_id = parse_project_id(project_id)?;
    let source_pr_number = source_pr_number
        .map(|raw| PrNumber::from_raw(raw).ok_or_else(|| AppError::InvalidIdentifier("sourcePrNumber must be non-zero".to_string())))
        .transpose()?;
    let project = load_project(store, project_id)?;

    let (vcs, ai, rag) = build_adapters(config, &project)?;
    let processor = BranchAnalysisProcessor::new(
        vcs,
        ai,
        rag,
        store.clone(),
        store.clone(),
        store.clone(),
        config.lock_timing.poll_interval(),
        config.lock_timing.max_wait(),
    );

    let request = BranchAnalysisRequest {
        project_id,
        target_branch: BranchName::from(target_branch),
        commit_hash: CommitHash::new(commit_hash),
        source_pr_number,
    };

    let sink = NdjsonEventSink::new(io::stdout());
    let cancel = CancellationToken::new();
    let outcome = processor.process(&request, TriggerSource::Manual, &sink, &cancel)?;
    print_json(&serde_json::json!({
        "files_changed": outcome.files_changed,
        "issues_resolved": outcome.issues_resolved,
        "total_issues": outcome.branch.counters.total_issues,
    }))
}

fn parse_project_id(raw: u64) -> Result<ProjectId, AppError> {
    ProjectId::from_raw(raw).ok_or_else(|| AppError::InvalidIdentifier("projectId must be non-zero".to_string()))
}

fn load_project(store: &Arc<SqliteStore>, project_id: ProjectId) -> Result<Project, AppError> {
    store
        .get_project(project_id)
        .map_err(|err| AppError::AdapterInit(err.to_string()))?
        .ok_or(AppError::ProjectNotFound(project_id.get()))
}

/// Builds the three HTTP-backed capabilities a pipeline run needs, reading
/// VCS provider tokens from the environment (the out-of-scope
/// `VcsClientProvider` capability's stand-in, per `revguard-vcs`'s
/// `VcsCredentials` doc comment) and the AI/RAG base URLs and secrets from
/// `config`.
fn build_adapters(
    config: &ServiceConfig,
    project: &Project,
) -> Result<(Arc<dyn VcsOperations>, Arc<dyn AiClient>, Arc<dyn RagOperations>), AppError> {
    let credentials = VcsCredentials {
        github_token: std::env::var(ENV_GITHUB_TOKEN).ok(),
        gitlab_token: std::env::var(ENV_GITLAB_TOKEN).ok(),
        bitbucket_token: std::env::var(ENV_BITBUCKET_TOKEN).ok(),
    };
    let vcs = VcsHttpOperations::new(credentials).map_err(|err| AppError::AdapterInit(err.to_string()))?;

    let ai_base_url = project.ai_binding.as_ref().map(|binding| binding.base_url.as_str()).unwrap_or(config.ai_base_url.as_str());
    let ai = AiHttpClient::new(ai_base_url, &config.ai_service_secret).map_err(|err| AppError::AdapterInit(err.to_string()))?;

    let rag_secret = config.rag_service_secret.as_deref().unwrap_or(config.ai_service_secret.as_str());
    let rag = HttpRagClient::new(rag_secret).map_err(|err| AppError::AdapterInit(err.to_string()))?;

    Ok((Arc::new(vcs), Arc::new(ai), Arc::new(rag)))
}

fn print_json(value: &serde_json::Value) -> Result<(), AppError> {
    let text = serde_json::to_string(value)?;
    let mut stdout = io::stdout();
    let _ = writeln!(&mut stdout, "{text}");
    Ok(())
}
