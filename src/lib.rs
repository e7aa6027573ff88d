//! Buildyard - implant build coordinator
//!
//! Produces implant binaries either by compiling them in-process or by
//! handing the config to an external builder, and keeps a single registry of
//! every finished build.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Build coordination: configs, tickets, artifacts, events
//! - [`registry`] - Build and config metadata, persisted as TOML
//! - [`infra`] - Infrastructure layer (filesystem, directories, compiler process)
//! - [`config`] - Constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;
pub mod registry;

#[cfg(test)]
pub mod test_utils;
