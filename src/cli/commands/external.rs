//! CLI command implementation for `buildyard external`
//!
//! The side of the protocol an external builder drives: request a ticket,
//! fetch a config, submit the artifact. Tickets are always printed as JSON.

use anyhow::{Context, Result};
use std::path::Path;

use super::read_config;
use crate::cli::output::{status, OutputConfig};
use crate::core::implant::ConfigId;
use crate::core::service::{BuildService, GenerateRequest};

/// Execute the `buildyard external ticket` command
pub fn execute_ticket(service: &BuildService, config_path: &Path) -> Result<()> {
    let config = read_config(config_path)?;
    let ticket = service.request_external_ticket(GenerateRequest::new(config))?;
    println!("{}", serde_json::to_string_pretty(&ticket)?);
    Ok(())
}

/// Execute the `buildyard external submit` command
pub fn execute_submit(
    service: &BuildService,
    name: &str,
    config_id: &str,
    file: &Path,
    output: OutputConfig,
) -> Result<()> {
    let data = std::fs::read(file)
        .with_context(|| format!("Failed to read artifact {}", file.display()))?;
    let build = service.submit_external_build(name, &ConfigId::new(config_id), &data)?;

    if output.json {
        return output.print_json(&build);
    }
    output.status(
        status::SUCCESS,
        &format!("Stored build '{}' ({} bytes)", build.name, data.len()),
    );
    Ok(())
}

/// Execute the `buildyard external config` command
pub fn execute_config(service: &BuildService, id: &str) -> Result<()> {
    let ticket = service.fetch_external_build_config(&ConfigId::new(id))?;
    println!("{}", serde_json::to_string_pretty(&ticket)?);
    Ok(())
}
