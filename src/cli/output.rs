//! Output formatting and progress indicators
//!
//! Spinners for long-running builds, status prefixes and the error report
//! printed before the process exits.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::error::BuildError;

/// Output mode chosen by the global flags
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    pub quiet: bool,
    pub json: bool,
    pub verbose: u8,
}

impl OutputConfig {
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Log filter directive for the verbosity level
    pub fn log_directive(&self) -> tracing::Level {
        match (self.quiet, self.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, _) => tracing::Level::DEBUG,
        }
    }

    /// Whether human-readable progress should be shown
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.json
    }

    /// Print a status line unless quiet or in JSON mode
    pub fn status(&self, prefix: &str, message: &str) {
        if self.show_progress() {
            println!("{prefix} {message}");
        }
    }

    /// Print `value` as pretty JSON
    pub fn print_json<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Create a spinner for operations with unknown duration
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.blue} {msg}")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Print an error with its kind and cause chain to stderr
pub fn display_error(error: &anyhow::Error) {
    match error.downcast_ref::<BuildError>() {
        Some(build_error) => eprintln!(
            "{} error[{}]: {error}",
            status::ERROR,
            build_error.kind()
        ),
        None => eprintln!("{} error: {error}", status::ERROR),
    }
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}
