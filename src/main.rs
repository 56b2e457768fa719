//! addon-preflight - check deployed Helm releases before an addon upgrade
//!
//! Reads the releases in the current cluster, matches them against addon
//! bundles and prints a report of action items.

mod cli;

use addon_preflight::config::ConfigLoader;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli::{CheckArgs, ConfigSubcommand, GenerateArgs};
use std::path::PathBuf;

/// Check deployed Helm releases against addon upgrade bundles
#[derive(Parser, Debug)]
#[command(name = "addon-preflight")]
#[command(about = "Checks installed Helm releases against addon upgrade bundles", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Kubeconfig context to use instead of the current one
    #[arg(long, global = true)]
    context: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// Main commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Validate deployed releases against addon bundles
    Check(CheckArgs),
    /// Summarize deployed releases and their upgrade status
    Generate(GenerateArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Version => {
            cli::display_version();
            Ok(())
        }
        Command::Config { subcommand } => cli::handle_config_command(subcommand),
        Command::Check(check) => {
            cli::init_logging(args.debug, args.log_file.as_deref())?;
            let config = ConfigLoader::load().context("Failed to load configuration")?;
            cli::run_check(check, config, args.context.as_deref()).await
        }
        Command::Generate(generate) => {
            cli::init_logging(args.debug, args.log_file.as_deref())?;
            let config = ConfigLoader::load().context("Failed to load configuration")?;
            cli::run_generate(generate, config, args.context.as_deref()).await
        }
    }
}
