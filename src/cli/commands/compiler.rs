//! CLI command implementation for `buildyard compiler`

use anyhow::Result;

use crate::cli::output::OutputConfig;
use crate::core::service::BuildService;

/// Execute the `buildyard compiler` command
pub fn execute(service: &BuildService, output: OutputConfig) -> Result<()> {
    let info = service.compiler_info();
    if output.json {
        return output.print_json(&info);
    }

    println!("Host:    {}/{}", info.host_os, info.host_arch);
    let formats: Vec<&str> = info.formats.iter().map(|f| f.as_str()).collect();
    println!("Formats: {}", formats.join(", "));
    if let Some(revision) = &info.revision {
        println!("Revision: {revision}");
    }
    if let Some(rustc) = &info.rustc {
        println!("Rustc:   {rustc}");
    }
    if let Some(triple) = &info.target_triple {
        println!("Target:  {triple}");
    }
    Ok(())
}
