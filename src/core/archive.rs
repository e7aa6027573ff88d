//! Build archive
//!
//! Pairs the [`BuildRegistry`] with the [`ArtifactStore`]. Saving stages the
//! bytes, commits them under the build name and only then registers the
//! build; a lost registration undoes the commit. Removal deletes metadata
//! first and treats the artifact as best effort, since the registry is the
//! authority and a stray file is only a leak.
//!
//! Names with a save in progress are tracked so that orphan pruning never
//! touches an artifact whose registration is still pending.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::artifact_store::ArtifactStore;
use crate::core::implant::{GeneratedFile, ImplantBuild, ImplantConfig};
use crate::core::names::validate_build_name;
use crate::error::{BuildError, StorageError};
use crate::registry::BuildRegistry;

/// Registry plus artifact storage
#[derive(Debug)]
pub struct BuildArchive {
    registry: Arc<BuildRegistry>,
    artifacts: Arc<ArtifactStore>,
    saving: Mutex<HashSet<String>>,
}

/// Marks a name as being saved until dropped
struct SaveGuard<'a> {
    archive: &'a BuildArchive,
    name: String,
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut saving) = self.archive.saving.lock() {
            saving.remove(&self.name);
        }
    }
}

impl BuildArchive {
    pub fn new(registry: Arc<BuildRegistry>, artifacts: Arc<ArtifactStore>) -> Self {
        Self {
            registry,
            artifacts,
            saving: Mutex::new(HashSet::new()),
        }
    }

    fn lock_saving(&self) -> Result<MutexGuard<'_, HashSet<String>>, StorageError> {
        self.saving
            .lock()
            .map_err(|_| StorageError::Poisoned { what: "pending saves" })
    }

    fn begin_save(&self, name: &str) -> Result<SaveGuard<'_>, BuildError> {
        if !self.lock_saving()?.insert(name.to_string()) {
            return Err(BuildError::DuplicateBuildName {
                name: name.to_string(),
            });
        }
        Ok(SaveGuard {
            archive: self,
            name: name.to_string(),
        })
    }

    pub fn registry(&self) -> &Arc<BuildRegistry> {
        &self.registry
    }

    pub fn artifacts(&self) -> &Arc<ArtifactStore> {
        &self.artifacts
    }

    /// Store `data` as build `name` of `config` and register it
    ///
    /// `config` must already be registered.
    pub fn save(
        &self,
        name: &str,
        config: &ImplantConfig,
        data: &[u8],
    ) -> Result<ImplantBuild, BuildError> {
        validate_build_name(name)?;
        let _pending = self.begin_save(name)?;
        // Cheap early exit; insert_if_absent below is the authority
        if self.registry.contains(name)? {
            return Err(BuildError::DuplicateBuildName {
                name: name.to_string(),
            });
        }

        let staged = self.artifacts.stage(data)?;
        self.artifacts.commit(staged, name)?;

        let build = ImplantBuild::new(
            name,
            config.id.clone(),
            Some(name.to_string()),
            config.file_name(name),
        );
        match self.registry.insert_if_absent(build) {
            Ok(build) => Ok(build),
            Err(err) => {
                tracing::debug!("Registration of {name} failed, removing committed artifact");
                if let Err(cleanup) = self.artifacts.delete(name) {
                    tracing::error!("Failed to roll back artifact for {name}: {cleanup}");
                }
                Err(err)
            }
        }
    }

    /// Read a stored build back
    pub fn read(&self, name: &str) -> Result<GeneratedFile, BuildError> {
        let build = self.registry.lookup_by_name(name)?;
        let Some(pointer) = build.storage_pointer.as_deref() else {
            tracing::debug!("Build {name} has no stored artifact");
            return Err(BuildError::BuildNotFound {
                name: name.to_string(),
            });
        };
        let data = self.artifacts.read(pointer)?;
        Ok(GeneratedFile {
            name: build.file_name,
            data,
        })
    }

    /// Remove a build: metadata first, then the artifact
    ///
    /// If the artifact cannot be deleted the metadata removal stands and the
    /// storage error is returned.
    pub fn remove(&self, name: &str) -> Result<ImplantBuild, BuildError> {
        let build = self.registry.delete(name)?;
        if let Some(pointer) = build.storage_pointer.as_deref() {
            match self.artifacts.delete(pointer) {
                Ok(true) => {}
                Ok(false) => tracing::warn!("Artifact for build {name} was already missing"),
                Err(err) => {
                    tracing::warn!(
                        "Build {name} removed from registry but its artifact remains: {err}"
                    );
                    return Err(err);
                }
            }
        }
        Ok(build)
    }

    /// Stored artifacts that no registered build points at
    ///
    /// Artifacts of saves still in progress are never reported.
    pub fn orphans(&self) -> Result<Vec<String>, BuildError> {
        let saving = self.lock_saving()?;
        self.orphans_locked(&saving)
    }

    /// Delete orphaned artifacts, returning their keys
    ///
    /// No save can start while pruning runs, so a key reported here cannot
    /// gain a registration before it is deleted.
    pub fn prune_orphans(&self) -> Result<Vec<String>, BuildError> {
        let saving = self.lock_saving()?;
        let orphans = self.orphans_locked(&saving)?;
        for key in &orphans {
            self.artifacts.delete(key)?;
            tracing::info!("Pruned orphaned artifact {key}");
        }
        Ok(orphans)
    }

    // Keys are listed before pointers: a save that finished in between is
    // then already visible in the registry.
    fn orphans_locked(&self, saving: &HashSet<String>) -> Result<Vec<String>, BuildError> {
        let keys = self.artifacts.keys()?;
        let referenced = self.registry.storage_pointers()?;
        Ok(keys
            .into_iter()
            .filter(|key| !referenced.contains(key) && !saving.contains(key))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::implant::{ConfigId, OutputFormat, TargetPlatform};
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn setup() -> (BuildArchive, ImplantConfig, TempDir) {
        let temp = TempDir::new().unwrap();
        let registry = Arc::new(BuildRegistry::in_memory());
        let artifacts = Arc::new(ArtifactStore::open(temp.path()).unwrap());
        let config = ImplantConfig::new(TargetPlatform::new("windows", "amd64"), OutputFormat::External)
            .with_id(ConfigId::new("cfg-1"));
        registry.register_config(&config).unwrap();
        (BuildArchive::new(registry, artifacts), config, temp)
    }

    #[test]
    fn test_save_then_read() {
        let (archive, config, _temp) = setup();
        let build = archive.save("raven-falcon", &config, b"payload").unwrap();
        assert_eq!(build.storage_pointer.as_deref(), Some("raven-falcon"));
        assert_eq!(build.file_name, "raven-falcon.exe");

        let file = archive.read("raven-falcon").unwrap();
        assert_eq!(file.name, "raven-falcon.exe");
        assert_eq!(file.data, b"payload");
    }

    #[test]
    fn test_save_unknown_config_rolls_back_artifact() {
        let (archive, config, _temp) = setup();
        let unknown = config.with_id(ConfigId::new("cfg-unknown"));

        let err = archive.save("raven-falcon", &unknown, b"payload").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!archive.artifacts().exists("raven-falcon"));
        assert_eq!(archive.artifacts().staged_count(), 0);
    }

    #[test]
    fn test_save_over_orphan_is_duplicate() {
        let (archive, config, _temp) = setup();
        let store = archive.artifacts();
        store.commit(store.stage(b"stray").unwrap(), "raven").unwrap();

        let err = archive.save("raven", &config, b"new").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateBuildName);
        assert_eq!(store.read("raven").unwrap(), b"stray");
        assert!(!archive.registry().contains("raven").unwrap());
    }

    #[test]
    fn test_remove_deletes_both() {
        let (archive, config, _temp) = setup();
        archive.save("raven-falcon", &config, b"payload").unwrap();
        archive.remove("raven-falcon").unwrap();

        assert!(!archive.registry().contains("raven-falcon").unwrap());
        assert!(!archive.artifacts().exists("raven-falcon"));
        assert_eq!(
            archive.remove("raven-falcon").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_remove_tolerates_missing_artifact() {
        let (archive, config, _temp) = setup();
        archive.save("raven-falcon", &config, b"payload").unwrap();
        archive.artifacts().delete("raven-falcon").unwrap();
        assert!(archive.remove("raven-falcon").is_ok());
    }

    #[test]
    fn test_read_without_pointer_is_not_found() {
        let (archive, config, _temp) = setup();
        archive
            .registry()
            .insert_if_absent(ImplantBuild::new("bare", config.id.clone(), None, "bare"))
            .unwrap();
        assert_eq!(archive.read("bare").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_orphans_and_prune() {
        let (archive, config, _temp) = setup();
        archive.save("kept", &config, b"a").unwrap();
        let store = archive.artifacts();
        store.commit(store.stage(b"b").unwrap(), "stray").unwrap();

        assert_eq!(archive.orphans().unwrap(), vec!["stray"]);
        assert_eq!(archive.prune_orphans().unwrap(), vec!["stray"]);
        assert!(archive.orphans().unwrap().is_empty());
        assert!(store.exists("kept"));
    }

    #[test]
    fn test_pending_save_is_not_an_orphan() {
        let (archive, _config, _temp) = setup();
        let store = archive.artifacts();
        let pending = archive.begin_save("raven").unwrap();
        store.commit(store.stage(b"a").unwrap(), "raven").unwrap();

        assert!(archive.orphans().unwrap().is_empty());
        assert!(archive.prune_orphans().unwrap().is_empty());
        assert!(store.exists("raven"));

        drop(pending);
        assert_eq!(archive.orphans().unwrap(), vec!["raven"]);
    }

    #[test]
    fn test_concurrent_save_of_same_name_rejected() {
        let (archive, config, _temp) = setup();
        let _pending = archive.begin_save("raven").unwrap();
        let err = archive.save("raven", &config, b"a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateBuildName);
    }

    #[test]
    fn test_prune_during_saves_keeps_registered_builds() {
        let (archive, config, _temp) = setup();
        let archive = Arc::new(archive);
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let pruner = {
            let archive = Arc::clone(&archive);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut pruned = 0;
                while !done.load(std::sync::atomic::Ordering::SeqCst) {
                    pruned += archive.prune_orphans().unwrap().len();
                }
                pruned
            })
        };

        for i in 0..200 {
            archive.save(&format!("b{i}"), &config, b"payload").unwrap();
        }
        done.store(true, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(pruner.join().unwrap(), 0);

        for i in 0..200 {
            assert_eq!(archive.read(&format!("b{i}")).unwrap().data, b"payload");
        }
    }
}
