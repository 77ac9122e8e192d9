//! Configuration loading for chaos runs.
//!
//! Configuration is loaded from a TOML file (default: `engula-chaos.toml`).
//! Every section and field is optional; missing values take the defaults
//! below, so `engula-chaos init` output is a complete reference.

use chaos_core::{GeneratorConfig, Timing};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Cluster lifecycle via `bootstrap.sh`.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Supervisor process.
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    /// Restart timing.
    #[serde(default)]
    pub schedule: Timing,
    /// Loop control.
    #[serde(default)]
    pub run: RunConfig,
    /// Verifying workload.
    #[serde(default)]
    pub workload: WorkloadConfig,
}

/// Cluster configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Path to the lifecycle script (default: ./bootstrap.sh).
    #[serde(default = "default_bootstrap")]
    pub bootstrap: PathBuf,
    /// Interpreter to run the script with; executed directly if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
    /// Working directory for the script; current directory if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
    /// Number of servers the cluster runs (default: 3).
    #[serde(default = "default_servers")]
    pub servers: u32,
    /// A `status` output line containing this text as a whole word, not
    /// preceded by "not", counts as one live server.
    #[serde(default = "default_status_pattern")]
    pub status_pattern: String,
    /// Directories scanned for `core*` crash dumps (default: ["."]).
    #[serde(default = "default_core_dump_dirs")]
    pub core_dump_dirs: Vec<PathBuf>,
}

/// Supervisor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Supervisor executable (default: engula-supervisor).
    #[serde(default = "default_supervisor_binary")]
    pub binary: PathBuf,
    /// Arguments placed before `--config`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Directory passed as `--config` (default: config).
    #[serde(default = "default_supervisor_config_dir")]
    pub config_dir: PathBuf,
    /// File receiving the supervisor's stdout and stderr (default: supervisor.log).
    #[serde(default = "default_supervisor_log_file")]
    pub log_file: PathBuf,
    /// `RUST_LOG` value for the supervisor (default: info).
    #[serde(default = "default_rust_log")]
    pub rust_log: String,
    /// Refuse to start when a matching supervisor is already running (default: true).
    #[serde(default = "default_true")]
    pub check_existing: bool,
}

/// Loop control.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Stop after this many rounds; run until interrupted if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u64>,
    /// Schedule seed; a fresh one is drawn and logged if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Do not run `bootstrap.sh setup` (cluster already running).
    #[serde(default)]
    pub skip_setup: bool,
}

/// Workload configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Number of writer tasks (default: 1).
    #[serde(default = "default_writers")]
    pub writers: usize,
    /// Number of reader tasks (default: 1).
    #[serde(default = "default_readers")]
    pub readers: usize,
    /// Writer `i` uses `base_seed + i`; a fresh base is drawn if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_seed: Option<u64>,
    /// Attempts per collection operation before giving up (default: 120).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Pause between attempts in milliseconds (default: 1000).
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// Reader pause between verification steps in milliseconds (default: 10).
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Writer pause between operations in milliseconds (default: 1).
    ///
    /// Bounds how fast the collection grows: at most one new key per
    /// writer per interval. 0 runs writers unpaced.
    #[serde(default = "default_op_interval_ms")]
    pub op_interval_ms: u64,
    /// Key and value length ranges.
    #[serde(default)]
    pub generator: GeneratorConfig,
}

// Default value functions
fn default_bootstrap() -> PathBuf {
    PathBuf::from("./bootstrap.sh")
}

fn default_servers() -> u32 {
    3
}

fn default_status_pattern() -> String {
    "running".to_string()
}

fn default_core_dump_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

fn default_supervisor_binary() -> PathBuf {
    PathBuf::from("engula-supervisor")
}

fn default_supervisor_config_dir() -> PathBuf {
    PathBuf::from("config")
}

fn default_supervisor_log_file() -> PathBuf {
    PathBuf::from("supervisor.log")
}

fn default_rust_log() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_writers() -> usize {
    1
}

fn default_readers() -> usize {
    1
}

fn default_retry_attempts() -> u32 {
    120
}

fn default_retry_interval_ms() -> u64 {
    1000
}

fn default_tick_ms() -> u64 {
    10
}

fn default_op_interval_ms() -> u64 {
    1
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            bootstrap: default_bootstrap(),
            interpreter: None,
            work_dir: None,
            servers: default_servers(),
            status_pattern: default_status_pattern(),
            core_dump_dirs: default_core_dump_dirs(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            binary: default_supervisor_binary(),
            args: Vec::new(),
            config_dir: default_supervisor_config_dir(),
            log_file: default_supervisor_log_file(),
            rust_log: default_rust_log(),
            check_existing: default_true(),
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            writers: default_writers(),
            readers: default_readers(),
            base_seed: None,
            retry_attempts: default_retry_attempts(),
            retry_interval_ms: default_retry_interval_ms(),
            tick_ms: default_tick_ms(),
            op_interval_ms: default_op_interval_ms(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.servers == 0 {
            return Err(ConfigError::Invalid(
                "cluster.servers must be at least 1".into(),
            ));
        }
        if self.cluster.status_pattern.is_empty() {
            return Err(ConfigError::Invalid(
                "cluster.status_pattern must not be empty".into(),
            ));
        }
        self.schedule
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("schedule: {e}")))?;
        if self.workload.writers == 0 {
            return Err(ConfigError::Invalid(
                "workload.writers must be at least 1".into(),
            ));
        }
        if self.workload.retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "workload.retry_attempts must be at least 1".into(),
            ));
        }
        self.workload
            .generator
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("workload.generator: {e}")))?;
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Failed to render configuration.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] toml::ser::Error),
    /// Configuration parsed but is unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}
