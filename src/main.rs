//! Buildyard CLI - implant build coordinator
//!
//! Entry point for the buildyard command-line application.

use anyhow::Result;
use clap::Parser;

use buildyard::cli::output::display_error;
use buildyard::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output_config = cli.output_config();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(output_config.log_directive().into()),
        )
        .init();

    match cli.run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            display_error(&e);
            std::process::exit(1);
        }
    }
}
