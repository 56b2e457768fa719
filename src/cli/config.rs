//! Config command handlers

use addon_preflight::config::{ConfigLoader, paths};
use anyhow::{Context, Result};
use clap::Subcommand;

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Show configuration file path
    Path,
    /// Print the effective configuration
    Show,
    /// Validate configuration
    Validate,
}

/// Handle configuration subcommands
pub fn handle_config_command(cmd: ConfigSubcommand) -> Result<()> {
    match cmd {
        ConfigSubcommand::Path => {
            println!("{}", paths::root_config_path().display());
        }
        ConfigSubcommand::Show => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;
            let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
            print!("{}", yaml);
        }
        ConfigSubcommand::Validate => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;
            ConfigLoader::validate(&config).context("Configuration validation failed")?;
            println!("Configuration is valid");
        }
    }

    Ok(())
}
