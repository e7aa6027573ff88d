//! CLI command implementations
//!
//! Each command group is implemented in its own submodule. All of them work
//! against a [`BuildService`] opened by [`open_service`].

pub mod builds;
pub mod compiler;
pub mod external;
pub mod generate;

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::output::OutputConfig;
use crate::core::archive::BuildArchive;
use crate::core::artifact_store::ArtifactStore;
use crate::core::codenames::WordListCodenames;
use crate::core::compiler::CompilerTable;
use crate::core::events::EventBroker;
use crate::core::global_config::GlobalConfig;
use crate::core::implant::ImplantConfig;
use crate::core::secret::{HmacSecretDeriver, ServerKey};
use crate::core::service::BuildService;
use crate::error::BuildError;
use crate::infra::dirs::BuildyardDirs;
use crate::infra::toolchain::CommandCompiler;
use crate::registry::{BuildRegistry, TomlMetadataStore};

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile an implant locally
    Generate {
        /// Implant config (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Build name (a codename is generated if omitted)
        #[arg(short, long)]
        name: Option<String>,

        /// Directory to write the artifact to
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Write a stored build's artifact again without recompiling
    Regenerate {
        /// Build name
        name: String,

        /// Directory to write the artifact to
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List registered builds
    Builds,

    /// Delete a build and its artifact
    Delete {
        /// Build name
        name: String,
    },

    /// External builder protocol
    External {
        #[command(subcommand)]
        command: ExternalCommands,
    },

    /// Show local compiler capabilities
    Compiler,

    /// List artifacts no build points at
    Orphans {
        /// Delete them
        #[arg(long)]
        prune: bool,
    },
}

/// External builder subcommands
#[derive(Subcommand, Debug)]
pub enum ExternalCommands {
    /// Register an external-format config and issue a build ticket
    Ticket {
        /// Implant config (TOML)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Upload an externally built artifact
    Submit {
        /// Build name from the ticket
        #[arg(short, long)]
        name: String,

        /// Config id from the ticket
        #[arg(long)]
        config_id: String,

        /// Artifact file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Fetch a config by id, with a fresh ticket
    Config {
        /// Config id
        id: String,
    },
}

impl Commands {
    /// Execute the command
    pub async fn run(self, output: OutputConfig) -> Result<()> {
        let dirs = BuildyardDirs::new();
        let service = open_service(&dirs)?;

        match self {
            Self::Generate { config, name, out } => {
                generate::execute_generate(service, &config, name, out, output).await
            }
            Self::Regenerate { name, out } => {
                generate::execute_regenerate(&service, &name, out, output)
            }
            Self::Builds => builds::execute_list(&service, output),
            Self::Delete { name } => builds::execute_delete(&service, &name, output),
            Self::Orphans { prune } => builds::execute_orphans(&service, prune, output),
            Self::Compiler => compiler::execute(&service, output),
            Self::External { command } => match command {
                ExternalCommands::Ticket { config } => {
                    external::execute_ticket(&service, &config)
                }
                ExternalCommands::Submit {
                    name,
                    config_id,
                    file,
                } => external::execute_submit(&service, &name, &config_id, &file, output),
                ExternalCommands::Config { id } => external::execute_config(&service, &id),
            },
        }
    }
}

/// Wire a [`BuildService`] from the global config and platform directories
///
/// Creates the server key on first use.
pub fn open_service(dirs: &BuildyardDirs) -> Result<BuildService> {
    let config = GlobalConfig::load(dirs)?;

    let registry_path = dirs.registry_path();
    let registry = BuildRegistry::open(TomlMetadataStore::new(&registry_path))
        .with_context(|| format!("Failed to open registry {}", registry_path.display()))?;
    let artifacts = ArtifactStore::open(&config.storage_root(dirs))?;
    let archive = Arc::new(BuildArchive::new(Arc::new(registry), Arc::new(artifacts)));

    let key = ServerKey::load_or_create(&dirs.server_key_path())?;

    let compiler = CommandCompiler::new(config.compiler_program(), &dirs.work_dir())
        .with_args(config.compiler.args.clone())
        .with_timeout(config.compiler_timeout())
        .with_archive(Arc::clone(&archive));

    let codenames = WordListCodenames::with_overrides(
        config.names.adjectives.clone(),
        config.names.nouns.clone(),
    );

    Ok(
        BuildService::builder(archive, Arc::new(HmacSecretDeriver::new(key)))
            .compilers(CompilerTable::native(Arc::new(compiler)))
            .codenames(Arc::new(codenames))
            .events(Arc::new(EventBroker::new(config.event_capacity())))
            .build(),
    )
}

/// Read and parse an implant config file
pub(crate) fn read_config(path: &Path) -> Result<ImplantConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read implant config {}", path.display()))?;
    let config = ImplantConfig::from_toml(&content).map_err(|e| BuildError::InvalidConfig {
        reason: format!("{}: {e}", path.display()),
    })?;
    Ok(config)
}
