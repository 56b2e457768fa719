//! Configuration system
//!
//! Layers built-in defaults, the user's config file and environment
//! overrides. Command line flags are applied last by the binary.

mod defaults;
pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{Config, WebhookConfig};
