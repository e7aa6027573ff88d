//! External compiler toolchain
//!
//! [`CommandCompiler`] runs a configured program once per build. The program
//! reads its job from the environment:
//!
//! | Variable | Value |
//! |---|---|
//! | `BUILDYARD_NAME` | build name |
//! | `BUILDYARD_FORMAT` | output format, e.g. `shared_lib` |
//! | `BUILDYARD_TARGET_OS` / `BUILDYARD_TARGET_ARCH` | target platform |
//! | `BUILDYARD_CONFIG` | path to the config as JSON |
//! | `BUILDYARD_OUTPUT` | path the artifact must be written to |
//!
//! Output of the program goes to `build.log` next to the config.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::defaults::DEFAULT_COMPILER_TIMEOUT_SECS;
use crate::core::archive::BuildArchive;
use crate::core::compiler::ImplantCompiler;
use crate::core::implant::ImplantConfig;
use crate::error::{BuildError, CompileError, StorageError};
use crate::infra::filesystem;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Compiles implants by running an external program
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
    work_root: PathBuf,
    timeout: Duration,
    archive: Option<Arc<BuildArchive>>,
}

impl CommandCompiler {
    pub fn new(program: impl Into<String>, work_root: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_root: work_root.to_path_buf(),
            timeout: Duration::from_secs(DEFAULT_COMPILER_TIMEOUT_SECS),
            archive: None,
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Record every successful build in `archive`
    #[must_use]
    pub fn with_archive(mut self, archive: Arc<BuildArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Locate the compiler program
    pub fn resolve_program(&self) -> Result<PathBuf, CompileError> {
        which::which(&self.program).map_err(|_| CompileError::ToolchainNotFound {
            program: self.program.clone(),
        })
    }

    fn run(&self, program: &Path, name: &str, config: &ImplantConfig) -> Result<PathBuf, BuildError> {
        let work_dir = self
            .work_root
            .join(format!("{name}-{}", uuid::Uuid::new_v4().simple()));
        filesystem::create_dir_all(&work_dir)?;

        let config_path = work_dir.join("config.json");
        let encoded = serde_json::to_vec_pretty(config).map_err(|e| CompileError::Failed {
            name: name.to_string(),
            error: format!("cannot encode config: {e}"),
        })?;
        filesystem::write_atomic(&config_path, &encoded)?;

        let output = work_dir.join(config.file_name(name));
        let log_path = work_dir.join("build.log");
        let log = File::create(&log_path).map_err(|e| StorageError::WriteFile {
            path: log_path.clone(),
            error: e.to_string(),
        })?;
        let log_err = log.try_clone().map_err(|e| StorageError::WriteFile {
            path: log_path.clone(),
            error: e.to_string(),
        })?;

        let failed = |error: String| CompileError::Failed {
            name: name.to_string(),
            error,
        };

        tracing::debug!("Running {} for {name} in {}", program.display(), work_dir.display());
        let mut child = Command::new(program)
            .args(&self.args)
            .current_dir(&work_dir)
            .env("BUILDYARD_NAME", name)
            .env("BUILDYARD_FORMAT", config.format.as_str())
            .env("BUILDYARD_TARGET_OS", &config.target.os)
            .env("BUILDYARD_TARGET_ARCH", &config.target.arch)
            .env("BUILDYARD_CONFIG", &config_path)
            .env("BUILDYARD_OUTPUT", &output)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|e| failed(format!("cannot start {}: {e}", program.display())))?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    // Already exited between the poll and the kill is fine
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!("Compiler for {name} killed after {:?}", self.timeout);
                    return Err(CompileError::Timeout {
                        name: name.to_string(),
                        secs: self.timeout.as_secs(),
                    }
                    .into());
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(failed(e.to_string()).into()),
            }
        };

        if !status.success() {
            return Err(failed(format!("{status}, see {}", log_path.display())).into());
        }
        if !output.is_file() {
            return Err(CompileError::MissingOutput { path: output }.into());
        }
        Ok(output)
    }
}

impl ImplantCompiler for CommandCompiler {
    fn compile(&self, name: &str, config: &ImplantConfig) -> Result<PathBuf, BuildError> {
        let program = self.resolve_program()?;
        let output = self.run(&program, name, config)?;

        if let Some(archive) = &self.archive {
            let data = filesystem::read_bytes(&output)?;
            archive.save(name, config, &data)?;
            tracing::info!("Recorded build {name}");
        }
        Ok(output)
    }
}
