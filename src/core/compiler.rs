//! Compiler dispatch
//!
//! Local builds are dispatched on [`OutputFormat`] through a
//! [`CompilerTable`]. Service builds use the executable strategy; external
//! configs are never compiled locally.

use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::implant::{ImplantConfig, OutputFormat};
use crate::error::BuildError;

/// A strategy that turns a config into an artifact on disk
pub trait ImplantCompiler: Send + Sync {
    /// Build `config` as `name`, returning the path of the produced artifact
    fn compile(&self, name: &str, config: &ImplantConfig) -> Result<PathBuf, BuildError>;
}

/// Format-keyed compiler strategies
#[derive(Clone, Default)]
pub struct CompilerTable {
    strategies: HashMap<OutputFormat, Arc<dyn ImplantCompiler>>,
}

impl CompilerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// One compiler for every locally buildable format
    pub fn native(compiler: Arc<dyn ImplantCompiler>) -> Self {
        Self::new()
            .with(OutputFormat::Executable, Arc::clone(&compiler))
            .with(OutputFormat::SharedLib, Arc::clone(&compiler))
            .with(OutputFormat::Shellcode, compiler)
    }

    /// Register a strategy for `format`
    ///
    /// `External` is ignored and `Service` is an alias of `Executable`.
    #[must_use]
    pub fn with(mut self, format: OutputFormat, compiler: Arc<dyn ImplantCompiler>) -> Self {
        match format {
            OutputFormat::External => {
                tracing::warn!("Ignoring compiler registered for external format");
            }
            format => {
                self.strategies.insert(dispatch_key(format), compiler);
            }
        }
        self
    }

    /// Strategy for `format`
    pub fn resolve(&self, format: OutputFormat) -> Result<Arc<dyn ImplantCompiler>, BuildError> {
        self.strategies
            .get(&dispatch_key(format))
            .cloned()
            .ok_or_else(|| BuildError::UnsupportedFormat {
                format: format.to_string(),
            })
    }

    pub fn supports(&self, format: OutputFormat) -> bool {
        self.strategies.contains_key(&dispatch_key(format))
    }

    /// Formats that can be built locally, in declaration order
    pub fn formats(&self) -> Vec<OutputFormat> {
        OutputFormat::ALL
            .into_iter()
            .filter(|format| self.supports(*format))
            .collect()
    }
}

impl std::fmt::Debug for CompilerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerTable")
            .field("formats", &self.formats())
            .finish()
    }
}

fn dispatch_key(format: OutputFormat) -> OutputFormat {
    match format {
        OutputFormat::Service => OutputFormat::Executable,
        other => other,
    }
}

/// Host and compiler capabilities
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilerInfo {
    pub host_os: String,
    pub host_arch: String,
    pub formats: Vec<OutputFormat>,
    /// Revision of the coordinator itself, when known at build time
    pub revision: Option<String>,
    pub rustc: Option<String>,
    pub target_triple: Option<String>,
}

impl CompilerInfo {
    pub fn for_table(table: &CompilerTable) -> Self {
        Self {
            host_os: std::env::consts::OS.to_string(),
            host_arch: std::env::consts::ARCH.to_string(),
            formats: table.formats(),
            revision: option_env!("VERGEN_GIT_SHA").map(String::from),
            rustc: option_env!("VERGEN_RUSTC_SEMVER").map(String::from),
            target_triple: option_env!("VERGEN_CARGO_TARGET_TRIPLE").map(String::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingCompiler {
        calls: AtomicUsize,
    }

    impl ImplantCompiler for CountingCompiler {
        fn compile(&self, name: &str, _config: &ImplantConfig) -> Result<PathBuf, BuildError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PathBuf::from(name))
        }
    }

    #[test]
    fn test_service_uses_executable_strategy() {
        let table = CompilerTable::new().with(OutputFormat::Executable, Arc::new(CountingCompiler::default()));
        assert!(table.supports(OutputFormat::Service));
        assert!(table.resolve(OutputFormat::Service).is_ok());
        assert!(!table.supports(OutputFormat::Shellcode));
    }

    #[test]
    fn test_external_is_never_resolved() {
        let table = CompilerTable::native(Arc::new(CountingCompiler::default()))
            .with(OutputFormat::External, Arc::new(CountingCompiler::default()));
        let err = table.resolve(OutputFormat::External).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn test_native_formats() {
        let table = CompilerTable::native(Arc::new(CountingCompiler::default()));
        assert_eq!(
            table.formats(),
            vec![
                OutputFormat::Executable,
                OutputFormat::SharedLib,
                OutputFormat::Shellcode,
                OutputFormat::Service,
            ]
        );
    }

    #[test]
    fn test_dispatch_reaches_registered_strategy() {
        let exe = Arc::new(CountingCompiler::default());
        let lib = Arc::new(CountingCompiler::default());
        let table = CompilerTable::new()
            .with(OutputFormat::Executable, exe.clone())
            .with(OutputFormat::SharedLib, lib.clone());

        let config = ImplantConfig::new(
            crate::core::implant::TargetPlatform::new("linux", "amd64"),
            OutputFormat::SharedLib,
        );
        table.resolve(config.format).unwrap().compile("a", &config).unwrap();
        assert_eq!(lib.calls.load(Ordering::SeqCst), 1);
        assert_eq!(exe.calls.load(Ordering::SeqCst), 0);
    }
}
