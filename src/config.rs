//! Configuration loading and validation.
//!
//! The destination location and run limits are never hardcoded: callers build
//! a [`Config`] from a TOML file, environment variables and CLI flags, then
//! hand it to the [`Pipeline`](crate::pipeline::Pipeline).

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DATABASE_PATH: &str = "RISK_LOADER_DATABASE_PATH";
pub const ENV_SOURCE_DIR: &str = "RISK_LOADER_SOURCE_DIR";
pub const ENV_BUSY_TIMEOUT_MS: &str = "RISK_LOADER_BUSY_TIMEOUT_MS";
pub const ENV_TIMEOUT_SECS: &str = "RISK_LOADER_TIMEOUT_SECS";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub pipeline: RunConfig,
}

/// Destination store (SQLite file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Create the file when it does not exist. When false a missing file is a
    /// connection error.
    #[serde(default = "default_true")]
    pub create_if_missing: bool,

    /// How long to wait on a locked database before giving up (default: 5000).
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            create_if_missing: true,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Input directory holding one CSV file per table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_dir")]
    pub directory: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            directory: default_source_dir(),
        }
    }
}

/// Whole-run limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Abort and roll back when a run takes longer than this. Unset means no limit.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl RunConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("risk_monitor.db")
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(toml_str).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `RISK_LOADER_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production).
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            self.database.path = PathBuf::from(path);
        }
        if let Some(dir) = lookup(ENV_SOURCE_DIR) {
            self.source.directory = PathBuf::from(dir);
        }
        if let Some(ms) = lookup(ENV_BUSY_TIMEOUT_MS) {
            self.database.busy_timeout_ms = parse_number(ENV_BUSY_TIMEOUT_MS, &ms)?;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.pipeline.timeout_secs = Some(parse_number(ENV_TIMEOUT_SECS, &secs)?);
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(PipelineError::Config("database.path must not be empty".into()));
        }
        if self.source.directory.as_os_str().is_empty() {
            return Err(PipelineError::Config(
                "source.directory must not be empty".into(),
            ));
        }
        if self.pipeline.timeout_secs == Some(0) {
            return Err(PipelineError::Config(
                "pipeline.timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| PipelineError::Config(format!("{} must be a whole number, got {:?}", key, raw)))
}
