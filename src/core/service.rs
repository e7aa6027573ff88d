//! Coordinator boundary
//!
//! [`BuildService`] is the single entry point operators and external
//! builders talk to. It owns the wiring between registry, artifact store,
//! local and external build paths, and the event sink.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::archive::BuildArchive;
use crate::core::codenames::{CodenameGenerator, WordListCodenames};
use crate::core::compiler::{CompilerInfo, CompilerTable};
use crate::core::events::{BuildEvent, EventBroker, EventKind, EventSink};
use crate::core::external::ExternalBuilderProtocol;
use crate::core::implant::{ConfigId, GeneratedFile, ImplantBuild, ImplantConfig};
use crate::core::local::LocalBuildCoordinator;
use crate::core::names::validate_build_name;
use crate::core::secret::SecretDeriver;
use crate::core::ticket::{ExternalBuildTicket, TicketIssuer};
use crate::error::BuildError;

/// Operator request carrying a config, which may be missing
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub config: Option<ImplantConfig>,
}

impl GenerateRequest {
    pub fn new(config: ImplantConfig) -> Self {
        Self {
            config: Some(config),
        }
    }
}

/// Boundary operations of the coordinator
#[derive(Clone)]
pub struct BuildService {
    archive: Arc<BuildArchive>,
    codenames: Arc<dyn CodenameGenerator>,
    local: LocalBuildCoordinator,
    external: ExternalBuilderProtocol,
    events: Arc<dyn EventSink>,
}

/// Collects the collaborators of a [`BuildService`]
pub struct BuildServiceBuilder {
    archive: Arc<BuildArchive>,
    secrets: Arc<dyn SecretDeriver>,
    compilers: CompilerTable,
    codenames: Arc<dyn CodenameGenerator>,
    events: Arc<dyn EventSink>,
}

impl BuildServiceBuilder {
    /// Local compiler strategies (none by default)
    #[must_use]
    pub fn compilers(mut self, compilers: CompilerTable) -> Self {
        self.compilers = compilers;
        self
    }

    #[must_use]
    pub fn codenames(mut self, codenames: Arc<dyn CodenameGenerator>) -> Self {
        self.codenames = codenames;
        self
    }

    #[must_use]
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn build(self) -> BuildService {
        let issuer = TicketIssuer::new(Arc::clone(&self.codenames), self.secrets);
        BuildService {
            local: LocalBuildCoordinator::new(
                self.compilers,
                Arc::clone(&self.archive),
                Arc::clone(&self.events),
            ),
            external: ExternalBuilderProtocol::new(
                Arc::clone(&self.archive),
                issuer,
                Arc::clone(&self.events),
            ),
            archive: self.archive,
            codenames: self.codenames,
            events: self.events,
        }
    }
}

impl BuildService {
    pub fn builder(archive: Arc<BuildArchive>, secrets: Arc<dyn SecretDeriver>) -> BuildServiceBuilder {
        BuildServiceBuilder {
            archive,
            secrets,
            compilers: CompilerTable::new(),
            codenames: Arc::new(WordListCodenames::new()),
            events: Arc::new(EventBroker::default()),
        }
    }

    pub fn archive(&self) -> &Arc<BuildArchive> {
        &self.archive
    }

    /// Build locally and return the artifact
    pub fn generate(&self, request: GenerateRequest) -> Result<GeneratedFile, BuildError> {
        let config = request.config.ok_or_else(|| BuildError::InvalidConfig {
            reason: "no config supplied".to_string(),
        })?;
        config.validate()?;
        self.local.ensure_supported(&config)?;

        let name = match &config.name {
            Some(name) => name.clone(),
            None => self.codenames.next()?,
        };
        validate_build_name(&name)?;
        if self.archive.registry().contains(&name)? {
            return Err(BuildError::DuplicateBuildName { name });
        }

        self.archive.registry().register_config(&config)?;
        self.local.build(&name, &config)
    }

    /// Return a stored build's artifact
    pub fn regenerate(&self, name: &str) -> Result<GeneratedFile, BuildError> {
        self.local.regenerate(name)
    }

    /// Build name to config of every registered build
    pub fn list_builds(&self) -> Result<BTreeMap<String, ImplantConfig>, BuildError> {
        Ok(self
            .archive
            .registry()
            .list_builds()?
            .into_iter()
            .map(|(build, config)| (build.name, config))
            .collect())
    }

    /// Registered build records, sorted by name
    pub fn build_records(&self) -> Result<Vec<(ImplantBuild, ImplantConfig)>, BuildError> {
        self.archive.registry().list_builds()
    }

    /// Remove a build and its artifact
    pub fn delete_build(&self, name: &str) -> Result<(), BuildError> {
        self.archive.remove(name)?;
        self.events
            .publish(BuildEvent::new(EventKind::BuildDeleted, name));
        Ok(())
    }

    pub fn request_external_ticket(
        &self,
        request: GenerateRequest,
    ) -> Result<ExternalBuildTicket, BuildError> {
        self.external.request_ticket(request.config)
    }

    pub fn submit_external_build(
        &self,
        name: &str,
        config_id: &ConfigId,
        data: &[u8],
    ) -> Result<ImplantBuild, BuildError> {
        self.external.submit_build(name, config_id, data)
    }

    pub fn fetch_external_build_config(
        &self,
        config_id: &ConfigId,
    ) -> Result<ExternalBuildTicket, BuildError> {
        self.external.fetch_config(config_id)
    }

    pub fn compiler_info(&self) -> CompilerInfo {
        self.local.compiler_info()
    }

    /// Artifacts left behind by failed deletions
    pub fn orphaned_artifacts(&self) -> Result<Vec<String>, BuildError> {
        self.archive.orphans()
    }

    pub fn prune_orphans(&self) -> Result<Vec<String>, BuildError> {
        self.archive.prune_orphans()
    }
}

impl std::fmt::Debug for BuildService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildService")
            .field("archive", &self.archive)
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}
