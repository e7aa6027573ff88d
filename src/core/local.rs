//! In-process builds
//!
//! The coordinator picks a compiler by output format, runs it and returns
//! the produced bytes. Recording the build is up to the compiler.

use std::sync::Arc;

use crate::core::archive::BuildArchive;
use crate::core::compiler::{CompilerInfo, CompilerTable};
use crate::core::events::{BuildEvent, EventKind, EventSink};
use crate::core::implant::{GeneratedFile, ImplantConfig};
use crate::error::BuildError;
use crate::infra::filesystem;

/// Drives local compilation
#[derive(Clone)]
pub struct LocalBuildCoordinator {
    compilers: CompilerTable,
    archive: Arc<BuildArchive>,
    events: Arc<dyn EventSink>,
}

impl LocalBuildCoordinator {
    pub fn new(
        compilers: CompilerTable,
        archive: Arc<BuildArchive>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            compilers,
            archive,
            events,
        }
    }

    /// Whether `config` can be built here
    pub fn ensure_supported(&self, config: &ImplantConfig) -> Result<(), BuildError> {
        self.compilers.resolve(config.format).map(|_| ())
    }

    /// Compile `config` as `name` and return the artifact
    pub fn build(&self, name: &str, config: &ImplantConfig) -> Result<GeneratedFile, BuildError> {
        let compiler = self.compilers.resolve(config.format)?;
        tracing::info!(
            "Building {name} ({} for {})",
            config.format,
            config.target
        );

        let path = compiler.compile(name, config)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| config.file_name(name));
        let data = filesystem::read_bytes(&path)?;

        self.events
            .publish(BuildEvent::new(EventKind::BuildCompleted, name));
        Ok(GeneratedFile {
            name: file_name,
            data,
        })
    }

    /// Return a previously recorded build without recompiling
    pub fn regenerate(&self, name: &str) -> Result<GeneratedFile, BuildError> {
        self.archive.read(name)
    }

    pub fn compiler_info(&self) -> CompilerInfo {
        CompilerInfo::for_table(&self.compilers)
    }
}

impl std::fmt::Debug for LocalBuildCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBuildCoordinator")
            .field("compilers", &self.compilers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::artifact_store::ArtifactStore;
    use crate::core::compiler::ImplantCompiler;
    use crate::core::events::EventBroker;
    use crate::core::implant::{OutputFormat, TargetPlatform};
    use crate::error::{CompileError, ErrorKind};
    use crate::registry::BuildRegistry;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Writes `<name>-<format>` into the output directory
    struct EchoCompiler {
        out_dir: PathBuf,
    }

    impl ImplantCompiler for EchoCompiler {
        fn compile(&self, name: &str, config: &ImplantConfig) -> Result<PathBuf, BuildError> {
            let path = self.out_dir.join(config.file_name(name));
            std::fs::write(&path, format!("{name}-{}", config.format)).unwrap();
            Ok(path)
        }
    }

    struct BrokenCompiler;

    impl ImplantCompiler for BrokenCompiler {
        fn compile(&self, name: &str, _config: &ImplantConfig) -> Result<PathBuf, BuildError> {
            Err(CompileError::Failed {
                name: name.to_string(),
                error: "linker exploded".to_string(),
            }
            .into())
        }
    }

    fn coordinator(
        temp: &TempDir,
        compilers: CompilerTable,
    ) -> (LocalBuildCoordinator, EventBroker) {
        let archive = Arc::new(BuildArchive::new(
            Arc::new(BuildRegistry::in_memory()),
            Arc::new(ArtifactStore::open(&temp.path().join("store")).unwrap()),
        ));
        let broker = EventBroker::new(8);
        (
            LocalBuildCoordinator::new(compilers, archive, Arc::new(broker.clone())),
            broker,
        )
    }

    fn config(format: OutputFormat) -> ImplantConfig {
        ImplantConfig::new(TargetPlatform::new("windows", "amd64"), format)
    }

    #[test]
    fn test_build_returns_artifact_and_announces() {
        let temp = TempDir::new().unwrap();
        let table = CompilerTable::native(Arc::new(EchoCompiler {
            out_dir: temp.path().to_path_buf(),
        }));
        let (local, broker) = coordinator(&temp, table);
        let mut rx = broker.subscribe();

        let file = local.build("QUIET_OTTER", &config(OutputFormat::SharedLib)).unwrap();
        assert_eq!(file.name, "QUIET_OTTER.dll");
        assert_eq!(file.data, b"QUIET_OTTER-shared_lib");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, EventKind::BuildCompleted);
        assert_eq!(event.payload, "QUIET_OTTER");
    }

    #[test]
    fn test_service_builds_as_executable() {
        let temp = TempDir::new().unwrap();
        let table = CompilerTable::new().with(
            OutputFormat::Executable,
            Arc::new(EchoCompiler {
                out_dir: temp.path().to_path_buf(),
            }),
        );
        let (local, _broker) = coordinator(&temp, table);
        let file = local.build("SVC", &config(OutputFormat::Service)).unwrap();
        assert_eq!(file.name, "SVC.exe");
    }

    #[test]
    fn test_external_format_unsupported() {
        let temp = TempDir::new().unwrap();
        let table = CompilerTable::native(Arc::new(BrokenCompiler));
        let (local, _broker) = coordinator(&temp, table);
        let err = local.build("X", &config(OutputFormat::External)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        assert!(local.ensure_supported(&config(OutputFormat::External)).is_err());
    }

    #[test]
    fn test_compiler_failure_publishes_nothing() {
        let temp = TempDir::new().unwrap();
        let table = CompilerTable::native(Arc::new(BrokenCompiler));
        let (local, broker) = coordinator(&temp, table);
        let mut rx = broker.subscribe();

        let err = local.build("X", &config(OutputFormat::Executable)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CompilerFailure);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_regenerate_unknown_build() {
        let temp = TempDir::new().unwrap();
        let (local, _broker) = coordinator(&temp, CompilerTable::new());
        assert_eq!(
            local.regenerate("ghost").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_compiler_info_lists_formats() {
        let temp = TempDir::new().unwrap();
        let (local, _broker) = coordinator(&temp, CompilerTable::native(Arc::new(BrokenCompiler)));
        let info = local.compiler_info();
        assert_eq!(info.host_os, std::env::consts::OS);
        assert!(info.formats.contains(&OutputFormat::Shellcode));
        assert!(!info.formats.contains(&OutputFormat::External));
    }
}
