//! Build registry
//!
//! Authoritative mapping from build name to build metadata, plus the config
//! table builds refer to. Every mutation runs under one mutex and is
//! persisted through the [`MetadataStore`] before it becomes visible, which
//! makes [`BuildRegistry::insert_if_absent`] the single serialization point
//! for name uniqueness.

pub mod file;
pub mod store;

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use crate::core::implant::{ConfigId, ImplantBuild, ImplantConfig};
use crate::error::{BuildError, StorageError};

pub use file::TomlMetadataStore;
pub use store::{MemoryMetadataStore, MetadataStore, RegistrySnapshot};

/// Registry of builds and configs
pub struct BuildRegistry {
    state: Mutex<RegistrySnapshot>,
    store: Box<dyn MetadataStore>,
}

impl BuildRegistry {
    /// Open a registry over `store`, loading what it holds
    pub fn open(store: impl MetadataStore + 'static) -> Result<Self, BuildError> {
        let snapshot = store.load()?;
        tracing::debug!(
            "Registry loaded: {} builds, {} configs",
            snapshot.builds.len(),
            snapshot.configs.len()
        );
        Ok(Self {
            state: Mutex::new(snapshot),
            store: Box::new(store),
        })
    }

    /// Registry that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(RegistrySnapshot::default()),
            store: Box::new(MemoryMetadataStore::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RegistrySnapshot>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Poisoned { what: "build registry" })
    }

    /// Persist `next` and make it current; on failure nothing changes
    fn commit(
        &self,
        state: &mut MutexGuard<'_, RegistrySnapshot>,
        next: RegistrySnapshot,
    ) -> Result<(), StorageError> {
        self.store.save(&next)?;
        **state = next;
        Ok(())
    }

    /// Store a config under its id
    ///
    /// Re-registering an identical config is a no-op. An id already bound to
    /// different content is rejected: configs never change once identified.
    pub fn register_config(&self, config: &ImplantConfig) -> Result<(), BuildError> {
        let mut state = self.lock()?;
        match state.configs.get(&config.id) {
            Some(existing) if existing == config => return Ok(()),
            Some(_) => {
                return Err(BuildError::InvalidConfig {
                    reason: format!("config id '{}' is bound to a different config", config.id),
                })
            }
            None => {}
        }

        let mut next = state.clone();
        next.configs.insert(config.id.clone(), config.clone());
        self.commit(&mut state, next)?;
        tracing::debug!("Registered config {}", config.id);
        Ok(())
    }

    /// Insert `build` unless its name is taken
    ///
    /// Of any number of concurrent calls for one name exactly one succeeds;
    /// the rest get [`BuildError::DuplicateBuildName`].
    pub fn insert_if_absent(&self, build: ImplantBuild) -> Result<ImplantBuild, BuildError> {
        let mut state = self.lock()?;
        if state.builds.contains_key(&build.name) {
            return Err(BuildError::DuplicateBuildName { name: build.name });
        }
        if !state.configs.contains_key(&build.config_id) {
            return Err(BuildError::ConfigNotFound {
                id: build.config_id.to_string(),
            });
        }

        let mut next = state.clone();
        next.builds.insert(build.name.clone(), build.clone());
        self.commit(&mut state, next)?;
        tracing::info!("Registered build {} (config {})", build.name, build.config_id);
        Ok(build)
    }

    /// Whether a build with this name exists
    pub fn contains(&self, name: &str) -> Result<bool, BuildError> {
        Ok(self.lock()?.builds.contains_key(name))
    }

    pub fn lookup_by_name(&self, name: &str) -> Result<ImplantBuild, BuildError> {
        self.lock()?
            .builds
            .get(name)
            .cloned()
            .ok_or_else(|| BuildError::BuildNotFound {
                name: name.to_string(),
            })
    }

    pub fn lookup_by_config_id(&self, id: &ConfigId) -> Result<ImplantConfig, BuildError> {
        self.lock()?
            .configs
            .get(id)
            .cloned()
            .ok_or_else(|| BuildError::ConfigNotFound { id: id.to_string() })
    }

    /// Remove a build's metadata, returning the removed record
    ///
    /// The artifact is left to the caller.
    pub fn delete(&self, name: &str) -> Result<ImplantBuild, BuildError> {
        let mut state = self.lock()?;
        let mut next = state.clone();
        let removed = next
            .builds
            .remove(name)
            .ok_or_else(|| BuildError::BuildNotFound {
                name: name.to_string(),
            })?;
        self.commit(&mut state, next)?;
        tracing::info!("Removed build {name} from registry");
        Ok(removed)
    }

    /// All builds with their configs, sorted by build name
    pub fn list_builds(&self) -> Result<Vec<(ImplantBuild, ImplantConfig)>, BuildError> {
        let state = self.lock()?;
        let mut listed = Vec::with_capacity(state.builds.len());
        for build in state.builds.values() {
            match state.configs.get(&build.config_id) {
                Some(config) => listed.push((build.clone(), config.clone())),
                None => tracing::warn!(
                    "Build {} references missing config {}",
                    build.name,
                    build.config_id
                ),
            }
        }
        Ok(listed)
    }

    /// Storage pointers of all registered builds
    pub fn storage_pointers(&self) -> Result<BTreeSet<String>, BuildError> {
        Ok(self
            .lock()?
            .builds
            .values()
            .filter_map(|build| build.storage_pointer.clone())
            .collect())
    }
}

impl std::fmt::Debug for BuildRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildRegistry").finish_non_exhaustive()
    }
}
