//! Implant configuration and build records
//!
//! An [`ImplantConfig`] is the immutable build specification; an
//! [`ImplantBuild`] is the registered result of building one.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::names::validate_build_name;
use crate::error::BuildError;

/// Stable identifier of an implant config
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigId(String);

impl ConfigId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Output format of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Executable,
    SharedLib,
    Shellcode,
    Service,
    /// Built by an out-of-process worker
    External,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        Self::Executable,
        Self::SharedLib,
        Self::Shellcode,
        Self::Service,
        Self::External,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Executable => "executable",
            Self::SharedLib => "shared_lib",
            Self::Shellcode => "shellcode",
            Self::Service => "service",
            Self::External => "external",
        }
    }

    /// File extension for artifacts of this format on the given OS
    pub fn extension(self, os: &str) -> &'static str {
        match (self, os) {
            (Self::Executable | Self::Service | Self::External, "windows") => ".exe",
            (Self::SharedLib, "windows") => ".dll",
            (Self::SharedLib, "darwin") => ".dylib",
            (Self::SharedLib, _) => ".so",
            (Self::Shellcode, _) => ".bin",
            _ => "",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target operating system and architecture
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetPlatform {
    pub os: String,
    pub arch: String,
}

impl TargetPlatform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// Build specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplantConfig {
    /// Stable identifier; generated when the operator file omits it
    #[serde(default = "ConfigId::generate")]
    pub id: ConfigId,

    /// Requested build name; a codename is assigned when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub format: OutputFormat,

    /// Feature flags passed through to the compiler
    #[serde(default)]
    pub features: Vec<String>,

    #[serde(default)]
    pub debug: bool,

    // Kept last: TOML emits tables after plain values.
    pub target: TargetPlatform,
}

impl ImplantConfig {
    /// Create a config with a fresh identifier
    pub fn new(target: TargetPlatform, format: OutputFormat) -> Self {
        Self {
            id: ConfigId::generate(),
            name: None,
            target,
            format,
            features: Vec::new(),
            debug: false,
        }
    }

    /// Set the identifier
    #[must_use]
    pub fn with_id(mut self, id: ConfigId) -> Self {
        self.id = id;
        self
    }

    /// Set the requested build name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the feature flags
    #[must_use]
    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.features = features;
        self
    }

    /// Parse from TOML string
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Structural checks only; semantic checks belong to the compiler
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.id.as_str().trim().is_empty() {
            return Err(invalid("config id must not be empty"));
        }
        for (field, value) in [("os", &self.target.os), ("arch", &self.target.arch)] {
            if value.is_empty() {
                return Err(invalid(format!("target {field} must not be empty")));
            }
            if !value
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            {
                return Err(invalid(format!("target {field} '{value}' is malformed")));
            }
        }
        if let Some(name) = &self.name {
            validate_build_name(name).map_err(|e| invalid(e.to_string()))?;
        }
        let mut seen = HashSet::new();
        for feature in &self.features {
            if feature.trim().is_empty() {
                return Err(invalid("feature flags must not be empty"));
            }
            if !seen.insert(feature.as_str()) {
                return Err(invalid(format!("feature flag '{feature}' is repeated")));
            }
        }
        Ok(())
    }

    /// Artifact file name for a build of this config
    pub fn file_name(&self, build_name: &str) -> String {
        format!("{build_name}{}", self.format.extension(&self.target.os))
    }
}

fn invalid(reason: impl Into<String>) -> BuildError {
    BuildError::InvalidConfig {
        reason: reason.into(),
    }
}

/// A registered build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplantBuild {
    pub name: String,
    pub config_id: ConfigId,
    /// Artifact store key; `None` when the bytes were never persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_pointer: Option<String>,
    pub file_name: String,
    /// Unix seconds
    pub created_at: u64,
}

impl ImplantBuild {
    pub fn new(
        name: impl Into<String>,
        config_id: ConfigId,
        storage_pointer: Option<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            config_id,
            storage_pointer,
            file_name: file_name.into(),
            created_at: unix_now(),
        }
    }
}

/// A named artifact returned to the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub name: String,
    pub data: Vec<u8>,
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
