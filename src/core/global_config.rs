//! Global configuration management
//!
//! Reads settings from `config.toml` in the config directory. Every setting
//! is optional; the effective-value getters fall back to the defaults in
//! [`crate::config::defaults`] and the platform directories.

use crate::config::defaults::{
    DEFAULT_COMPILER_PROGRAM, DEFAULT_COMPILER_TIMEOUT_SECS, DEFAULT_EVENT_CAPACITY,
};
use crate::infra::dirs::BuildyardDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Global configuration error types
#[derive(Error, Debug)]
pub enum GlobalConfigError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    ReadError { path: String, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    ParseError { path: String, error: String },
}

/// Global configuration for buildyard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Where artifacts are kept
    #[serde(default)]
    pub storage: StorageConfig,

    /// Local compiler invocation
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Event delivery
    #[serde(default)]
    pub events: EventsConfig,

    /// Codename word lists
    #[serde(default)]
    pub names: NamesConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Artifact store root
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Program run for each local build
    pub program: Option<String>,

    /// Extra arguments passed before the environment is read
    #[serde(default)]
    pub args: Vec<String>,

    /// Kill the compiler after this many seconds
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Events buffered per subscriber
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamesConfig {
    /// Replace the built-in adjective list
    pub adjectives: Option<Vec<String>>,

    /// Replace the built-in noun list
    pub nouns: Option<Vec<String>>,
}

impl GlobalConfig {
    /// Load global configuration from the config directory
    ///
    /// A missing file yields the defaults; an unreadable or invalid one is an
    /// error.
    pub fn load(dirs: &BuildyardDirs) -> Result<Self, GlobalConfigError> {
        Self::load_from_path(&dirs.global_config_path())
    }

    /// Load global configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, GlobalConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| GlobalConfigError::ReadError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| GlobalConfigError::ParseError {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Effective artifact store root
    #[must_use]
    pub fn storage_root(&self, dirs: &BuildyardDirs) -> PathBuf {
        self.storage
            .root
            .clone()
            .unwrap_or_else(|| dirs.artifacts_root())
    }

    #[must_use]
    pub fn compiler_program(&self) -> &str {
        self.compiler
            .program
            .as_deref()
            .unwrap_or(DEFAULT_COMPILER_PROGRAM)
    }

    #[must_use]
    pub fn compiler_timeout(&self) -> Duration {
        Duration::from_secs(
            self.compiler
                .timeout_secs
                .unwrap_or(DEFAULT_COMPILER_TIMEOUT_SECS),
        )
    }

    /// Effective event capacity, never zero
    #[must_use]
    pub fn event_capacity(&self) -> usize {
        self.events
            .capacity
            .unwrap_or(DEFAULT_EVENT_CAPACITY)
            .max(1)
    }
}
