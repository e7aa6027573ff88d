//! Artifact storage
//!
//! Finished binaries live under `<root>/builds/<key>`. Writes always go
//! through a private staging file under `<root>/staging` that is renamed
//! into place, never overwriting an existing artifact. Staging files are
//! removed when dropped, so an abandoned write leaves nothing behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::defaults::STAGING_PREFIX;
use crate::core::names::validate_build_name;
use crate::error::{BuildError, StorageError};
use crate::infra::filesystem;

const BUILDS_SUBDIR: &str = "builds";
const STAGING_SUBDIR: &str = "staging";

/// Name-addressed artifact storage
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    builds_dir: PathBuf,
    staging_dir: PathBuf,
}

/// Bytes written to a staging file but not yet committed
#[derive(Debug)]
pub struct StagedArtifact {
    file: tempfile::NamedTempFile,
}

impl StagedArtifact {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl ArtifactStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: &Path) -> Result<Self, StorageError> {
        let store = Self {
            builds_dir: root.join(BUILDS_SUBDIR),
            staging_dir: root.join(STAGING_SUBDIR),
        };
        filesystem::create_dir_all(&store.builds_dir)?;
        filesystem::create_dir_all(&store.staging_dir)?;
        Ok(store)
    }

    pub fn builds_dir(&self) -> &Path {
        &self.builds_dir
    }

    /// Final location of the artifact stored under `key`
    pub fn artifact_path(&self, key: &str) -> Result<PathBuf, BuildError> {
        validate_build_name(key)?;
        Ok(self.builds_dir.join(key))
    }

    /// Write `data` to a private staging file
    pub fn stage(&self, data: &[u8]) -> Result<StagedArtifact, StorageError> {
        let write_err = |e: std::io::Error| StorageError::WriteFile {
            path: self.staging_dir.clone(),
            error: e.to_string(),
        };

        let mut file = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.staging_dir)
            .map_err(write_err)?;
        file.write_all(data).map_err(write_err)?;
        file.as_file().sync_all().map_err(write_err)?;

        tracing::debug!("Staged {} bytes at {}", data.len(), file.path().display());
        Ok(StagedArtifact { file })
    }

    /// Atomically move a staged file to its final location under `key`
    ///
    /// Fails with [`BuildError::DuplicateBuildName`] if an artifact is
    /// already stored under `key`; the existing file is never replaced.
    pub fn commit(&self, staged: StagedArtifact, key: &str) -> Result<PathBuf, BuildError> {
        let path = self.artifact_path(key)?;
        match staged.file.persist_noclobber(&path) {
            Ok(_) => {
                tracing::debug!("Committed artifact {}", path.display());
                Ok(path)
            }
            // The staging file is dropped with the error and thereby removed
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(BuildError::DuplicateBuildName {
                    name: key.to_string(),
                })
            }
            Err(e) => Err(StorageError::Commit {
                path,
                error: e.error.to_string(),
            }
            .into()),
        }
    }

    /// Read the artifact stored under `key`
    pub fn read(&self, key: &str) -> Result<Vec<u8>, BuildError> {
        let path = self.artifact_path(key)?;
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BuildError::BuildNotFound {
                    name: key.to_string(),
                }
            } else {
                StorageError::ReadFile {
                    path,
                    error: e.to_string(),
                }
                .into()
            }
        })
    }

    /// Remove the artifact stored under `key`, returning whether it existed
    pub fn delete(&self, key: &str) -> Result<bool, BuildError> {
        let path = self.artifact_path(key)?;
        Ok(filesystem::remove_file(&path)?)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.artifact_path(key).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Keys of every stored artifact, sorted
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for entry in walkdir::WalkDir::new(&self.builds_dir)
            .min_depth(1)
            .max_depth(1)
        {
            let entry = entry.map_err(|e| StorageError::ReadFile {
                path: self.builds_dir.clone(),
                error: e.to_string(),
            })?;
            if entry.file_type().is_file() {
                keys.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Number of files currently in the staging area
    pub fn staged_count(&self) -> usize {
        std::fs::read_dir(&self.staging_dir)
            .map(|entries| entries.filter_map(Result::ok).count())
            .unwrap_or(0)
    }
}
