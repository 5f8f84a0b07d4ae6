//! Configuration loading and management
//!
//! Handles parsing of `config.toml` in the data root.

use serde::Deserialize;
use std::path::Path;

use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;
use crate::task::Priority;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Undo/redo history configuration
    #[serde(default)]
    pub history: HistoryConfig,

    /// Task defaults
    #[serde(default)]
    pub tasks: TasksConfig,

    /// File locking configuration
    #[serde(default)]
    pub lock: LockConfig,
}

/// History-related configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HistoryConfig {
    /// Maximum number of undoable transactions kept; unbounded when unset
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Task defaults
#[derive(Debug, Clone, Deserialize)]
pub struct TasksConfig {
    /// Priority for `tix add` without `--priority`
    #[serde(default)]
    pub default_priority: Priority,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            default_priority: Priority::Medium,
        }
    }
}

/// Lock configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    /// How long to wait for the task/history lock
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a `config.toml` file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the data root, or return defaults
    pub fn load_from_dir(root: &Path) -> Self {
        let config_path = root.join("config.toml");
        if !config_path.exists() {
            return Self::default();
        }

        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    fn validate(&self) -> crate::error::Result<()> {
        if self.history.limit == Some(0) {
            return Err(crate::error::Error::InvalidConfig(
                "history.limit must be at least 1".to_string(),
            ));
        }
        if self.lock.timeout_ms == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "lock.timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
