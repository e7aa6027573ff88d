//! CLI command implementation for `buildyard builds`, `delete` and `orphans`

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{status, OutputConfig};
use crate::core::service::BuildService;

#[derive(Debug, Serialize)]
struct BuildRow {
    name: String,
    config_id: String,
    format: String,
    target: String,
    file: String,
    created_at: u64,
}

/// Execute the `buildyard builds` command
pub fn execute_list(service: &BuildService, output: OutputConfig) -> Result<()> {
    if output.json {
        return output.print_json(&service.list_builds()?);
    }

    let records = service.build_records()?;
    if records.is_empty() {
        println!("No builds registered.");
        return Ok(());
    }

    let rows: Vec<BuildRow> = records
        .into_iter()
        .map(|(build, config)| BuildRow {
            name: build.name,
            config_id: build.config_id.to_string(),
            format: config.format.to_string(),
            target: config.target.to_string(),
            file: build.file_name,
            created_at: build.created_at,
        })
        .collect();

    let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
    println!("Builds:");
    println!();
    for row in &rows {
        println!(
            "  {:width$}  {:<10} {:<14} {}",
            row.name, row.format, row.target, row.config_id
        );
        if output.verbose > 0 {
            println!("  {:width$}  file: {}, created: {}", "", row.file, row.created_at);
        }
    }
    Ok(())
}

/// Execute the `buildyard delete` command
pub fn execute_delete(service: &BuildService, name: &str, output: OutputConfig) -> Result<()> {
    service.delete_build(name)?;
    output.status(status::SUCCESS, &format!("Deleted build '{name}'"));
    Ok(())
}

/// Execute the `buildyard orphans` command
pub fn execute_orphans(service: &BuildService, prune: bool, output: OutputConfig) -> Result<()> {
    let orphans = if prune {
        service.prune_orphans()?
    } else {
        service.orphaned_artifacts()?
    };

    if output.json {
        return output.print_json(&orphans);
    }
    if orphans.is_empty() {
        println!("No orphaned artifacts.");
        return Ok(());
    }

    let prefix = if prune { status::SUCCESS } else { status::WARNING };
    let verb = if prune { "Pruned" } else { "Orphaned" };
    for key in &orphans {
        println!("{prefix} {verb} artifact '{key}'");
    }
    Ok(())
}
