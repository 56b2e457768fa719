//! Configuration schema definitions
//!
//! Defines the structure of the configuration file using serde.

use super::defaults;
use crate::report::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Restrict the run to one namespace; all namespaces when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Report format
    #[serde(default)]
    pub output: OutputFormat,

    /// Matches validated at once
    #[serde(default = "defaults::concurrency")]
    pub concurrency: usize,

    /// Timeout for upstream chart downloads
    #[serde(default = "defaults::timeout_secs")]
    pub schema_fetch_timeout_secs: u64,

    /// Directory of additional bundle files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_directory: Option<PathBuf>,

    /// Webhook delivery
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WebhookConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Name of the environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: None,
            output: OutputFormat::default(),
            concurrency: defaults::concurrency(),
            schema_fetch_timeout_secs: defaults::timeout_secs(),
            bundle_directory: None,
            webhook: WebhookConfig::default(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key_env: None,
            timeout_secs: defaults::timeout_secs(),
        }
    }
}

impl Config {
    pub fn schema_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.schema_fetch_timeout_secs)
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
