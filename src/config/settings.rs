use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::cluster::http::HttpClusterConfig;
use crate::pool::DEFAULT_MAX_CONCURRENCY;
use crate::util::paths::{config_path, log_file_path, logs_dir};

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

const DEFAULT_SNAPSHOT_DIR: &str = "./fleet-backup";
const DEFAULT_SERVER: &str = "http://127.0.0.1:8001";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Worker count for each pool run
    pub max_concurrency: usize,
    /// Log intended writes instead of performing them
    pub dry_run: bool,
    /// Snapshot root written by `backup`
    pub backup_dir: PathBuf,
    /// Snapshot root read by `restore`
    pub restore_dir: PathBuf,
    /// Exit non-zero when any task failed or was dropped
    pub fail_on_errors: bool,
    /// Kind allow-list (None = every built-in kind)
    pub kinds: Option<Vec<String>>,
    /// Cluster connection
    pub cluster: ClusterConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub server: String,
    pub token: Option<String>,
    pub insecure: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    /// Append to this file instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            dry_run: false,
            backup_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            restore_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            fail_on_errors: false,
            kinds: None,
            cluster: ClusterConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            token: None,
            insecure: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

/// TOML representation of the `[cluster]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlClusterConfig {
    pub server: Option<String>,
    pub token: Option<String>,
    pub insecure: Option<bool>,
    pub timeout_secs: Option<u64>,
}

/// TOML representation of the `[log]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlLogConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub max_concurrency: Option<usize>,
    pub dry_run: Option<bool>,
    pub backup_dir: Option<PathBuf>,
    pub restore_dir: Option<PathBuf>,
    pub fail_on_errors: Option<bool>,
    pub kinds: Option<Vec<String>>,
    pub cluster: Option<TomlClusterConfig>,
    pub log: Option<TomlLogConfig>,
}

impl Config {
    /// Load `~/.fleetsnap/config.toml` if present, merged over defaults
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load an explicit config file; the file must exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let toml_config =
            toml::from_str::<TomlConfig>(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Config::default();
        config.merge(toml_config);
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Overlay every value set in `toml_config`
    pub fn merge(&mut self, toml_config: TomlConfig) {
        if let Some(max_concurrency) = toml_config.max_concurrency {
            self.max_concurrency = max_concurrency;
        }
        if let Some(dry_run) = toml_config.dry_run {
            self.dry_run = dry_run;
        }
        if let Some(dir) = toml_config.backup_dir {
            self.backup_dir = dir;
        }
        if let Some(dir) = toml_config.restore_dir {
            self.restore_dir = dir;
        }
        if let Some(fail_on_errors) = toml_config.fail_on_errors {
            self.fail_on_errors = fail_on_errors;
        }
        if toml_config.kinds.is_some() {
            self.kinds = toml_config.kinds;
        }

        if let Some(cluster) = toml_config.cluster {
            if let Some(server) = cluster.server {
                self.cluster.server = server;
            }
            if cluster.token.is_some() {
                self.cluster.token = cluster.token;
            }
            if let Some(insecure) = cluster.insecure {
                self.cluster.insecure = insecure;
            }
            if let Some(timeout_secs) = cluster.timeout_secs {
                self.cluster.timeout_secs = timeout_secs;
            }
        }

        if let Some(log) = toml_config.log {
            if let Some(level) = log.level {
                self.log.level = level;
            }
            if let Some(file) = log.file {
                self.log.file = Some(resolve_log_file(file));
            }
        }
    }

    /// Reject values no run could use
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.cluster.server.trim().is_empty() {
            return Err(ConfigError::Invalid("cluster.server must not be empty".into()));
        }
        if self.cluster.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "cluster.timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Connection settings for the HTTP cluster adapter
    pub fn http_config(&self) -> HttpClusterConfig {
        HttpClusterConfig {
            server: self.cluster.server.clone(),
            token: self.cluster.token.clone(),
            insecure: self.cluster.insecure,
            timeout: Duration::from_secs(self.cluster.timeout_secs),
        }
    }
}

/// An empty `[log] file` means the default log file. Relative names land in
/// the logs directory.
fn resolve_log_file(file: PathBuf) -> PathBuf {
    if file.as_os_str().is_empty() {
        log_file_path()
    } else if file.is_relative() {
        logs_dir().join(file)
    } else {
        file
    }
}
