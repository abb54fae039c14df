//! Arena configuration
//!
//! Sources apply in order, later wins: defaults, an optional TOML file,
//! `ARENA_*` environment variables, then whatever the binary's flags set.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Countdown tick length in milliseconds
    pub tick_interval_ms: u64,
    /// Countdown length when a caller gives none
    pub default_countdown_secs: u64,
    /// Queue size for each in-process subscriber
    pub subscriber_buffer: usize,
    /// Tracing filter used when RUST_LOG is unset
    pub log_filter: String,
    /// JSON snapshot backing the in-memory store
    pub snapshot_path: Option<PathBuf>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            default_countdown_secs: 30,
            subscriber_buffer: 64,
            log_filter: "arena=info".to_string(),
            snapshot_path: None,
        }
    }
}

impl ArenaConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then the file if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay `ARENA_*` variables. Unparseable numbers are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(n) = lookup("ARENA_TICK_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.tick_interval_ms = n;
        }
        if let Some(n) = lookup("ARENA_DEFAULT_COUNTDOWN_SECS").and_then(|v| v.parse().ok()) {
            self.default_countdown_secs = n;
        }
        if let Some(n) = lookup("ARENA_SUBSCRIBER_BUFFER").and_then(|v| v.parse().ok()) {
            self.subscriber_buffer = n;
        }
        if let Some(filter) = lookup("ARENA_LOG_FILTER") {
            self.log_filter = filter;
        }
        if let Some(path) = lookup("ARENA_SNAPSHOT_PATH") {
            self.snapshot_path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be > 0".into()));
        }
        if self.subscriber_buffer == 0 {
            return Err(ConfigError::Invalid("subscriber_buffer must be > 0".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
