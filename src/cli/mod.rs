//! CLI command handling module
//!
//! Handles all CLI subcommands and argument parsing.

mod check;
mod config;
mod generate;
mod logging;
mod version;

pub use check::{CheckArgs, run_check};
pub use config::{ConfigSubcommand, handle_config_command};
pub use generate::{GenerateArgs, run_generate};
pub use logging::init_logging;
pub use version::display_version;
