//! Logging initialization

use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize logging
///
/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--debug`. Logs go
/// to stderr so stdout only carries the report, or to `log_file` when set.
pub fn init_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;

            tracing_subscriber::fmt()
                .with_writer(file)
                .with_env_filter(filter)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .with_target(debug)
                .init();
        }
    }

    Ok(())
}
