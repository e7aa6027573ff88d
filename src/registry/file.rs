//! TOML-file registry store

use std::path::PathBuf;

use super::store::{MetadataStore, RegistrySnapshot};
use crate::error::StorageError;
use crate::infra::filesystem;

/// Persists the registry as a single TOML document
#[derive(Debug, Clone)]
pub struct TomlMetadataStore {
    path: PathBuf,
}

impl TomlMetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MetadataStore for TomlMetadataStore {
    fn load(&self) -> Result<RegistrySnapshot, StorageError> {
        if !self.path.exists() {
            return Ok(RegistrySnapshot::default());
        }
        let content = filesystem::read_file(&self.path)?;
        toml::from_str(&content).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            error: e.to_string(),
        })
    }

    fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), StorageError> {
        let content = toml::to_string_pretty(snapshot).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            error: e.to_string(),
        })?;
        filesystem::write_atomic(&self.path, content.as_bytes())
    }
}
