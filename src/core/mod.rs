//! Core business logic module
//!
//! Everything that decides what a build is, where it lives and who may
//! produce it. Filesystem and process plumbing lives in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`implant`] - Implant configs, builds and output formats
//! - [`names`] - Build name allow-list
//! - [`codenames`] - Generated build names
//! - [`secret`] - Server key and one-time ticket secrets
//! - [`ticket`] - External build tickets
//! - [`artifact_store`] - Artifact files keyed by build name
//! - [`archive`] - Registry plus artifact storage, saved and removed together
//! - [`compiler`] - Compiler strategies keyed by output format
//! - [`local`] - In-process builds
//! - [`external`] - External builder protocol
//! - [`events`] - Build lifecycle notifications
//! - [`service`] - Boundary operations
//! - [`global_config`] - Global configuration management

pub mod archive;
pub mod artifact_store;
pub mod codenames;
pub mod compiler;
pub mod events;
pub mod external;
pub mod global_config;
pub mod implant;
pub mod local;
pub mod names;
pub mod secret;
pub mod service;
pub mod ticket;
