//! Error types for buildyard
//!
//! Domain-specific error types using thiserror. Every failure that crosses
//! the service boundary is a [`BuildError`], and every [`BuildError`] maps to
//! a distinguishable [`ErrorKind`] so callers can decide between retrying and
//! fixing the request.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Storage errors (registry persistence and artifact files)
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },

    /// Failed to remove file
    #[error("Failed to remove file '{path}': {error}")]
    RemoveFile { path: PathBuf, error: String },

    /// Failed to move a staged file into place
    #[error("Failed to commit staged artifact to '{path}': {error}")]
    Commit { path: PathBuf, error: String },

    /// Registry snapshot could not be encoded or decoded
    #[error("Registry data at '{path}' is invalid: {error}")]
    Corrupt { path: PathBuf, error: String },

    /// A lock guarding shared state was poisoned by a panicking thread
    #[error("Lock poisoned: {what}")]
    Poisoned { what: &'static str },
}

/// Compiler collaborator errors
#[derive(Error, Debug)]
pub enum CompileError {
    /// Compiler program could not be located
    #[error("Toolchain not found: {program}")]
    ToolchainNotFound { program: String },

    /// Compiler ran but reported failure
    #[error("Build failed for '{name}': {error}")]
    Failed { name: String, error: String },

    /// Compiler exceeded its time budget
    #[error("Build for '{name}' timed out after {secs}s")]
    Timeout { name: String, secs: u64 },

    /// Compiler finished but produced no artifact
    #[error("Compiler produced no artifact at '{path}'")]
    MissingOutput { path: PathBuf },
}

/// Secret derivation errors
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Long-lived key material is unusable
    #[error("Server key material is invalid: {error}")]
    KeyMaterial { error: String },

    /// MAC could not be initialised
    #[error("Failed to derive one-time secret: {error}")]
    Derive { error: String },
}

/// Coarse classification of a [`BuildError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidConfig,
    InvalidName,
    DuplicateBuildName,
    FormatMismatch,
    NotFound,
    UnsupportedFormat,
    CompilerFailure,
    StorageFailure,
    CryptoFailure,
    Codename,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidConfig => "invalid-config",
            Self::InvalidName => "invalid-name",
            Self::DuplicateBuildName => "duplicate-build-name",
            Self::FormatMismatch => "format-mismatch",
            Self::NotFound => "not-found",
            Self::UnsupportedFormat => "unsupported-format",
            Self::CompilerFailure => "compiler-failure",
            Self::StorageFailure => "storage-failure",
            Self::CryptoFailure => "crypto-failure",
            Self::Codename => "codename",
        };
        f.write_str(s)
    }
}

/// Top-level buildyard error type
#[derive(Error, Debug)]
pub enum BuildError {
    /// Configuration is absent or structurally malformed
    #[error("Invalid implant config: {reason}")]
    InvalidConfig { reason: String },

    /// Build name is not safe to use as a storage key
    #[error("Invalid build name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// A build with this name is already registered
    #[error("A build named '{name}' already exists")]
    DuplicateBuildName { name: String },

    /// Operation applied to a config of the wrong output format
    #[error("Invalid implant config format: expected {expected}, got {actual}")]
    FormatMismatch { expected: String, actual: String },

    /// No build with this name
    #[error("Build '{name}' not found")]
    BuildNotFound { name: String },

    /// No config with this id
    #[error("Implant config '{id}' not found")]
    ConfigNotFound { id: String },

    /// No local compiler handles this format
    #[error("Invalid output format: {format}")]
    UnsupportedFormat { format: String },

    /// Compiler error
    #[error("Compiler error: {0}")]
    Compile(#[from] CompileError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Crypto error
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Codename generator failure
    #[error("Failed to generate codename: {error}")]
    Codename { error: String },
}

impl BuildError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            Self::InvalidName { .. } => ErrorKind::InvalidName,
            Self::DuplicateBuildName { .. } => ErrorKind::DuplicateBuildName,
            Self::FormatMismatch { .. } => ErrorKind::FormatMismatch,
            Self::BuildNotFound { .. } | Self::ConfigNotFound { .. } => ErrorKind::NotFound,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::Compile(_) => ErrorKind::CompilerFailure,
            Self::Storage(_) => ErrorKind::StorageFailure,
            Self::Crypto(_) => ErrorKind::CryptoFailure,
            Self::Codename { .. } => ErrorKind::Codename,
        }
    }

    /// Whether repeating the identical request may succeed
    ///
    /// Validation failures never are. A lost name race is not either: the
    /// caller has to pick a different name.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::StorageFailure | ErrorKind::CryptoFailure | ErrorKind::Codename
        )
    }
}
