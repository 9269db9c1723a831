// crates/revguard-config/src/lib.rs
// ============================================================================
// Module: Revguard Config
// Description: Service-level runtime configuration: TOML file plus
//   environment-variable overlay.
// Purpose: Give `revguard-cli` one typed configuration surface for the AI
//   service, VCS/RAG secrets, the SQLite path, worker pool sizing, and lock
//   timing, instead of scattering `env::var` calls through the binary.
// Dependencies: revguard-core, serde, toml, thiserror
// ============================================================================

//! ## Overview
//! [`ServiceConfig::load`] reads a TOML file into the typed model, then
//! overlays six environment variables on top — the same "file plus env
//! overlay" shape the donor's `decision-gate-config` crate carries in its
//! manifest (no source is retrieved in the example pack, so this follows
//! the documented contract rather than donor code directly). Lock TTLs per
//! [`revguard_core::AnalysisType`] and the `pollInterval`/`maxWait`
//! defaults live alongside the rest in [`LockTimingConfig`].

#![forbid(unsafe_code)]

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Environment variable overriding [`ServiceConfig::ai_base_url`].
const ENV_AI_BASE_URL: &str = "REVGUARD_AI_BASE_URL";
/// Environment variable overriding [`ServiceConfig::ai_service_secret`].
const ENV_AI_SERVICE_SECRET: &str = "REVGUARD_AI_SERVICE_SECRET";
/// Environment variable overriding [`ServiceConfig::db_path`].
const ENV_DB_PATH: &str = "REVGUARD_DB_PATH";
/// Environment variable overriding [`ServiceConfig::rag_base_url`].
const ENV_RAG_BASE_URL: &str = "REVGUARD_RAG_BASE_URL";
/// Environment variable overriding [`ServiceConfig::rag_service_secret`].
const ENV_RAG_SERVICE_SECRET: &str = "REVGUARD_RAG_SERVICE_SECRET";
/// Environment variable overriding [`ServiceConfig::worker_pool_size`].
const ENV_WORKER_POOL_SIZE: &str = "REVGUARD_WORKER_POOL_SIZE";

/// Errors loading or validating [`ServiceConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file was not valid TOML for this shape.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },
    /// An environment-variable override had a value that could not be
    /// parsed into the field's type.
    #[error("environment variable {name} has an invalid value: {value}")]
    InvalidEnvValue {
        /// Name of the offending variable.
        name: &'static str,
        /// The value that failed to parse.
        value: String,
    },
}

/// Lock TTLs per analysis type, and the polling cadence
/// `LockService::acquire_with_wait` uses while contended (§4.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LockTimingConfig {
    /// TTL for a `PR_ANALYSIS` lock.
    pub ttl_pr_analysis_secs: u64,
    /// TTL for a `BRANCH_ANALYSIS` lock.
    pub ttl_branch_analysis_secs: u64,
    /// TTL for a `RAG_INDEXING` lock.
    pub ttl_rag_indexing_secs: u64,
    /// How often `acquire_with_wait` re-polls on contention.
    pub poll_interval_secs: u64,
    /// How long `acquire_with_wait` polls before giving up.
    pub max_wait_secs: u64,
}

impl LockTimingConfig {
    /// Returns the configured poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Returns the configured max wait as a [`Duration`].
    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

impl Default for LockTimingConfig {
    fn default() -> Self {
        Self {
            ttl_pr_analysis_secs: 10 * 60,
            ttl_branch_analysis_secs: 15 * 60,
            ttl_rag_indexing_secs: 5 * 60,
            poll_interval_secs: 5,
            max_wait_secs: 2 * 60,
        }
    }
}

/// Service-level runtime configuration, loaded once at process start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServiceConfig {
    /// Base URL of the AI service (e.g. `https://ai.internal.example`).
    pub ai_base_url: String,
    /// Shared secret sent as `x-service-secret` on every AI request.
    pub ai_service_secret: String,
    /// Filesystem path to the SQLite database file.
    pub db_path: String,
    /// Base URL of the retrieval indexer, if the deployment runs one.
    #[serde(default)]
    pub rag_base_url: Option<String>,
    /// Shared secret sent as `x-service-secret` on every RAG request.
    #[serde(default)]
    pub rag_service_secret: Option<String>,
    /// Size of the bounded worker pool `revguard-cli` dispatches
    /// `process()` calls onto.
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    /// Lock TTL and polling configuration.
    #[serde(default)]
    pub lock_timing: LockTimingConfig,
}

const fn default_worker_pool_size() -> usize {
    16
}

impl ServiceConfig {
    /// Loads configuration from `path`, then overlays environment-variable
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or if
    /// an environment override has a value that does not parse into its
    /// field's type.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        let mut config: Self =
            toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;
        config.apply_overrides(|name| env::var(name).ok())?;
        Ok(config)
    }

    /// Applies the six environment-variable overrides using `lookup` as the
    /// source of each value, so the override logic is testable without
    /// mutating the real process environment.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ENV_AI_BASE_URL) {
            self.ai_base_url = value;
        }
        if let Some(value) = lookup(ENV_AI_SERVICE_SECRET) {
            self.ai_service_secret = value;
        }
        if let Some(value) = lookup(ENV_DB_PATH) {
            self.db_path = value;
        }
        if let Some(value) = lookup(ENV_RAG_BASE_URL) {
            self.rag_base_url = Some(value);
        }
        if let Some(value) = lookup(ENV_RAG_SERVICE_SECRET) {
            self.rag_service_secret = Some(value);
        }
        if let Some(value) = lookup(ENV_WORKER_POOL_SIZE) {
            self.worker_pool_size = value
                .parse()
                .map_err(|_err| ConfigError::InvalidEnvValue { name: ENV_WORKER_POOL_SIZE, value })?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_fixture(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        file.write_all(contents.as_bytes()).expect("write fixture");
        file
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let file = write_fixture(
            r#"
            ai_base_url = "https://ai.example.test"
            ai_service_secret = "secret"
            db_path = "revguard.sqlite3"
            "#,
        );
        let config = ServiceConfig::load(file.path()).expect("load config");
        assert_eq!(config.worker_pool_size, 16);
        assert_eq!(config.lock_timing.poll_interval_secs, 5);
        assert!(config.rag_base_url.is_none());
    }

    #[test]
    fn env_override_takes_precedence_over_file() {
        let file = write_fixture(
            r#"
            ai_base_url = "https://ai.example.test"
            ai_service_secret = "secret"
            db_path = "revguard.sqlite3"
            "#,
        );
        let mut config = ServiceConfig::load(file.path()).expect("load config");
        config
            .apply_overrides(|name| (name == ENV_DB_PATH).then(|| "/tmp/overridden.sqlite3".to_string()))
            .expect("apply overrides");
        assert_eq!(config.db_path, "/tmp/overridden.sqlite3");
    }

    #[test]
    fn rejects_unparseable_worker_pool_size_override() {
        let file = write_fixture(
            r#"
            ai_base_url = "https://ai.example.test"
            ai_service_secret = "secret"
            db_path = "revguard.sqlite3"
            "#,
        );
        let mut config = ServiceConfig::load(file.path()).expect("load config");
        let result = config.apply_overrides(|name| (name == ENV_WORKER_POOL_SIZE).then(|| "not-a-number".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidEnvValue { .. })));
    }
}
