//! Bridge configuration file
//!
//! ```yaml
//! host: 192.168.1.100
//! port: 16038
//! config_dir: ./config
//! options:
//!   power_model: off_effect
//!   off_effect_name: All Off
//!   off_grace_delay_ms: 500
//! executor:
//!   max_workers: 4
//!   timeout_secs: 15
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use ha_core::{DEFAULT_EXECUTOR_TIMEOUT, DEFAULT_MAX_WORKERS};
use ha_signalrgb::constants::DEFAULT_PORT;
use ha_signalrgb::SignalRgbOptions;
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV: &str = "SIGNALRGB_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "signalrgb.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub max_workers: usize,
    pub timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            timeout_secs: DEFAULT_EXECUTOR_TIMEOUT.as_secs(),
        }
    }
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Holds `.storage/core.config_entries`
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    #[serde(default)]
    pub options: SignalRgbOptions,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_config_dir() -> PathBuf {
    PathBuf::from(".")
}

impl BridgeConfig {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse and validate `content`; `path` is only used in errors
    pub fn parse(content: &str, path: &Path) -> ConfigResult<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|source| ConfigError::ParseYaml {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.host.trim().is_empty() {
            return Err(invalid("host", "must not be empty"));
        }
        if self.port == 0 {
            return Err(invalid("port", "must be between 1 and 65535"));
        }
        if self.executor.max_workers == 0 {
            return Err(invalid("executor.max_workers", "must be positive"));
        }
        if self.executor.timeout_secs == 0 {
            return Err(invalid("executor.timeout_secs", "must be positive"));
        }
        self.options
            .validate()
            .map_err(|err| invalid("options", &err.to_string()))
    }

    /// Unique id the config flow gives this host's entry
    pub fn unique_id(&self) -> String {
        format!("{}:{}", self.host.trim(), self.port)
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// First CLI argument, then `SIGNALRGB_CONFIG`, then `signalrgb.yaml`
pub fn config_path(arg: Option<String>, env: Option<String>) -> PathBuf {
    arg.or(env)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}
