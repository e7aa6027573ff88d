//! CLI command implementation for `buildyard generate` and `buildyard regenerate`

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::read_config;
use crate::cli::output::{create_spinner, status, OutputConfig};
use crate::core::implant::GeneratedFile;
use crate::core::service::{BuildService, GenerateRequest};
use crate::infra::filesystem;

/// Where an artifact ended up
#[derive(Debug, Serialize)]
struct WrittenArtifact {
    file: String,
    path: PathBuf,
    size: usize,
}

/// Execute the `buildyard generate` command
///
/// Compilation blocks, so it runs off the async runtime.
pub async fn execute_generate(
    service: BuildService,
    config_path: &Path,
    name: Option<String>,
    out: Option<PathBuf>,
    output: OutputConfig,
) -> Result<()> {
    let mut config = read_config(config_path)?;
    if let Some(name) = name {
        config = config.with_name(name);
    }

    let spinner = output
        .show_progress()
        .then(|| create_spinner(&format!("Compiling {} implant for {}", config.format, config.target)));
    let result = tokio::task::spawn_blocking(move || service.generate(GenerateRequest::new(config)))
        .await
        .context("Build task panicked")?;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let written = write_artifact(&result?, out)?;
    report(&written, "Generated", output)
}

/// Execute the `buildyard regenerate` command
pub fn execute_regenerate(
    service: &BuildService,
    name: &str,
    out: Option<PathBuf>,
    output: OutputConfig,
) -> Result<()> {
    let file = service.regenerate(name)?;
    let written = write_artifact(&file, out)?;
    report(&written, "Regenerated", output)
}

fn write_artifact(file: &GeneratedFile, out: Option<PathBuf>) -> Result<WrittenArtifact> {
    let dir = match out {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let path = dir.join(&file.name);
    filesystem::write_atomic(&path, &file.data)?;
    Ok(WrittenArtifact {
        file: file.name.clone(),
        path,
        size: file.data.len(),
    })
}

fn report(written: &WrittenArtifact, verb: &str, output: OutputConfig) -> Result<()> {
    if output.json {
        return output.print_json(written);
    }
    output.status(
        status::SUCCESS,
        &format!("{verb} {} ({} bytes)", written.path.display(), written.size),
    );
    Ok(())
}
