//! Platform-specific directory management
//!
//! Resolves where buildyard keeps its config, its durable state (registry,
//! artifacts, server key) and scratch space for compiler runs. XDG locations
//! on Linux, `~/Library` on macOS.
//!
//! Environment variables override the defaults:
//! - `BUILDYARD_CACHE_DIR`
//! - `BUILDYARD_CONFIG_DIR`
//! - `BUILDYARD_DATA_DIR`

use std::env;
use std::path::{Path, PathBuf};

use crate::config::defaults::{REGISTRY_FILE, SERVER_KEY_FILE};

/// Environment variable names for directory overrides
pub const ENV_CACHE_DIR: &str = "BUILDYARD_CACHE_DIR";
pub const ENV_CONFIG_DIR: &str = "BUILDYARD_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "BUILDYARD_DATA_DIR";

const APP_NAME: &str = "buildyard";

const WORK_SUBDIR: &str = "work";

/// Directory layout of one buildyard installation
#[derive(Debug, Clone)]
pub struct BuildyardDirs {
    cache_dir: PathBuf,
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl BuildyardDirs {
    /// Resolve directories from the environment, then platform defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache_dir: resolve(ENV_CACHE_DIR, dirs::cache_dir, &[".cache"]),
            config_dir: resolve(ENV_CONFIG_DIR, dirs::config_dir, &[".config"]),
            data_dir: resolve(ENV_DATA_DIR, dirs::data_dir, &[".local", "share"]),
        }
    }

    /// Use one root for everything, as tests and throwaway setups do
    #[must_use]
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            cache_dir: root.join("cache"),
            config_dir: root.join("config"),
            data_dir: root.join("data"),
        }
    }

    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone()
    }

    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// `config.toml` in the config directory
    #[must_use]
    pub fn global_config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Persistent build metadata
    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join(REGISTRY_FILE)
    }

    #[must_use]
    pub fn server_key_path(&self) -> PathBuf {
        self.data_dir.join(SERVER_KEY_FILE)
    }

    /// Default artifact store root, unless `[storage] root` says otherwise
    #[must_use]
    pub fn artifacts_root(&self) -> PathBuf {
        self.data_dir.join("artifacts")
    }

    /// Scratch directories for compiler runs
    ///
    /// Safe to wipe between runs.
    #[must_use]
    pub fn work_dir(&self) -> PathBuf {
        self.cache_dir.join(WORK_SUBDIR)
    }
}

impl Default for BuildyardDirs {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve(var: &str, platform: fn() -> Option<PathBuf>, home_fallback: &[&str]) -> PathBuf {
    if let Ok(path) = env::var(var) {
        return PathBuf::from(path);
    }

    platform().map_or_else(
        || {
            let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            home_fallback
                .iter()
                .fold(base, |path, part| path.join(part))
                .join(APP_NAME)
        },
        |p| p.join(APP_NAME),
    )
}
