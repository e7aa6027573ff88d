//! Registry persistence seam
//!
//! The registry keeps its working set in memory and hands a complete
//! snapshot to a [`MetadataStore`] after every mutation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::config::defaults::REGISTRY_FORMAT_VERSION;
use crate::core::implant::{ConfigId, ImplantBuild, ImplantConfig};
use crate::error::StorageError;

/// Complete registry content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Format version
    pub version: u32,

    /// Configs by id
    #[serde(default)]
    pub configs: BTreeMap<ConfigId, ImplantConfig>,

    /// Builds by name
    #[serde(default)]
    pub builds: BTreeMap<String, ImplantBuild>,
}

impl Default for RegistrySnapshot {
    fn default() -> Self {
        Self {
            version: REGISTRY_FORMAT_VERSION,
            configs: BTreeMap::new(),
            builds: BTreeMap::new(),
        }
    }
}

/// Durable backing for the build registry
pub trait MetadataStore: Send + Sync {
    /// Load the last saved snapshot (empty if nothing was saved yet)
    fn load(&self) -> Result<RegistrySnapshot, StorageError>;

    /// Replace the saved snapshot
    fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), StorageError>;
}

/// Non-durable store, for tests and throwaway coordinators
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    saved: Mutex<RegistrySnapshot>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn load(&self) -> Result<RegistrySnapshot, StorageError> {
        self.saved
            .lock()
            .map(|saved| saved.clone())
            .map_err(|_| StorageError::Poisoned {
                what: "memory metadata store",
            })
    }

    fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), StorageError> {
        let mut saved = self.saved.lock().map_err(|_| StorageError::Poisoned {
            what: "memory metadata store",
        })?;
        saved.clone_from(snapshot);
        Ok(())
    }
}
