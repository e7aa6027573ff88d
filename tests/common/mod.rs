//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

use buildyard::cli::commands::open_service;
use buildyard::core::service::BuildService;
use buildyard::infra::dirs::{BuildyardDirs, ENV_CACHE_DIR, ENV_CONFIG_DIR, ENV_DATA_DIR};

/// A throwaway buildyard installation
///
/// Config, data and cache directories all live under one temporary
/// directory, for both the library and the binary.
pub struct TestYard {
    pub dir: TempDir,
}

impl TestYard {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn dirs(&self) -> BuildyardDirs {
        BuildyardDirs::rooted_at(self.dir.path())
    }

    /// Open the service the way the binary does
    pub fn service(&self) -> BuildService {
        open_service(&self.dirs()).expect("Failed to open build service")
    }

    /// Create a file relative to the yard root
    pub fn create_file(&self, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Configure a shell-script compiler
    pub fn install_compiler(&self, script: &str) {
        let script_path = self.create_file("compile.sh", script);
        let config = format!(
            "[compiler]\nprogram = \"sh\"\nargs = [{:?}]\ntimeout_secs = 30\n",
            script_path.display().to_string()
        );
        let config_path = self.dirs().global_config_path();
        std::fs::create_dir_all(config_path.parent().unwrap()).unwrap();
        std::fs::write(config_path, config).expect("Failed to write config.toml");
    }

    /// Artifact store root in use
    pub fn builds_dir(&self) -> PathBuf {
        self.dirs().artifacts_root().join("builds")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.dirs().artifacts_root().join("staging")
    }

    /// Every file under the artifact store, relative to its root
    pub fn stored_files(&self) -> Vec<PathBuf> {
        let root = self.dirs().artifacts_root();
        if !root.exists() {
            return Vec::new();
        }
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().strip_prefix(&root).unwrap().to_path_buf())
            .collect();
        files.sort();
        files
    }

    /// Run the buildyard binary inside this yard
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_buildyard"))
            .current_dir(self.dir.path())
            .env(ENV_CONFIG_DIR, self.dirs().config_dir())
            .env(ENV_DATA_DIR, self.dirs().data_dir())
            .env(ENV_CACHE_DIR, self.dirs().cache_dir())
            .env_remove("RUST_LOG")
            .args(args)
            .output()
            .expect("Failed to execute buildyard")
    }
}

impl Default for TestYard {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Writes `implant:<name>:<format>` to the requested output
pub const FAKE_COMPILER: &str = r#"printf 'implant:%s:%s' "$BUILDYARD_NAME" "$BUILDYARD_FORMAT" > "$BUILDYARD_OUTPUT"
"#;

/// Fails without producing anything
pub const FAILING_COMPILER: &str = "echo 'undefined reference to main' >&2\nexit 1\n";

/// External-format config with a fixed id
pub const EXTERNAL_CONFIG: &str = r#"
id = "cfg-1"
name = "raven-falcon"
format = "external"
features = ["mtls"]

[target]
os = "windows"
arch = "amd64"
"#;

/// Locally buildable executable config
pub const EXECUTABLE_CONFIG: &str = r#"
format = "executable"
debug = true

[target]
os = "windows"
arch = "amd64"
"#;
