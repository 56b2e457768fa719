//! Configuration loading and merging logic
//!
//! Handles loading configuration from multiple sources and merging them
//! according to precedence rules.

use super::{
    defaults, paths,
    schema::{Config, WebhookConfig},
};
use crate::webhook::validate_webhook_url;
use anyhow::{Context, Result};
use std::path::Path;

pub const NAMESPACE_ENV: &str = "ADDON_PREFLIGHT_NAMESPACE";
pub const OUTPUT_ENV: &str = "ADDON_PREFLIGHT_OUTPUT";
pub const WEBHOOK_URL_ENV: &str = "ADDON_PREFLIGHT_WEBHOOK_URL";
pub const WEBHOOK_API_KEY_ENV: &str = "ADDON_PREFLIGHT_WEBHOOK_API_KEY";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with all layers merged
    ///
    /// Precedence order (highest to lowest):
    /// 1. Environment variable overrides
    /// 2. Root config file
    /// 3. Built-in defaults
    ///
    /// Command line flags are applied on top by the caller.
    pub fn load() -> Result<Config> {
        Self::load_with(&paths::root_config_path(), |name| std::env::var(name).ok())
    }

    /// Load from an explicit file, resolving environment variables through `lookup`
    pub fn load_with<F>(path: &Path, lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load_defaults();

        if path.exists() {
            let file_config = Self::load_file(path)?;
            config = Self::merge_config(config, file_config);
        } else {
            tracing::debug!("No config file at {}", path.display());
        }

        Self::apply_env_overrides(config, lookup)
    }

    /// Load configuration from a file
    pub fn load_file(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if contents.trim().is_empty() {
            return Ok(Self::load_defaults());
        }

        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Check values that parse but cannot work
    pub fn validate(config: &Config) -> Result<()> {
        if config.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        if config.schema_fetch_timeout_secs == 0 {
            anyhow::bail!("schemaFetchTimeoutSecs must be greater than 0");
        }
        if config.webhook.timeout_secs == 0 {
            anyhow::bail!("webhook.timeoutSecs must be greater than 0");
        }
        if let Some(url) = &config.webhook.url {
            validate_webhook_url(url)?;
        }
        if let Some(dir) = &config.bundle_directory {
            if !dir.is_dir() {
                anyhow::bail!("bundleDirectory {} is not a directory", dir.display());
            }
        }
        Ok(())
    }

    /// Load default configuration
    pub fn load_defaults() -> Config {
        defaults::default_config()
    }

    /// Merge two configurations, with `other` taking precedence
    fn merge_config(base: Config, other: Config) -> Config {
        Config {
            namespace: other.namespace.or(base.namespace),
            output: other.output,
            concurrency: other.concurrency,
            schema_fetch_timeout_secs: other.schema_fetch_timeout_secs,
            bundle_directory: other.bundle_directory.or(base.bundle_directory),
            webhook: WebhookConfig {
                url: other.webhook.url.or(base.webhook.url),
                api_key_env: other.webhook.api_key_env.or(base.webhook.api_key_env),
                timeout_secs: other.webhook.timeout_secs,
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides<F>(mut config: Config, lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(namespace) = lookup(NAMESPACE_ENV) {
            config.namespace = Some(namespace).filter(|ns| !ns.is_empty());
        }

        if let Some(output) = lookup(OUTPUT_ENV) {
            config.output = output
                .parse()
                .with_context(|| format!("Invalid {}", OUTPUT_ENV))?;
        }

        if let Some(url) = lookup(WEBHOOK_URL_ENV).filter(|url| !url.is_empty()) {
            config.webhook.url = Some(url);
        }

        Ok(config)
    }

    /// Resolve the webhook API key
    ///
    /// ADDON_PREFLIGHT_WEBHOOK_API_KEY wins over the variable named by
    /// `webhook.apiKeyEnv`.
    pub fn webhook_api_key<F>(config: &Config, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(WEBHOOK_API_KEY_ENV)
            .or_else(|| config.webhook.api_key_env.as_deref().and_then(&lookup))
            .filter(|key| !key.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::OutputFormat;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.concurrency, 1);
        assert!(config.webhook.url.is_none());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::load_with(&dir.path().join("config.yaml"), env(&[])).unwrap();
        assert_eq!(config, ConfigLoader::load_defaults());
    }

    #[test]
    fn test_file_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "namespace: kube-system\noutput: text\nconcurrency: 4\nwebhook:\n  url: https://hooks.example.com/x\n  apiKeyEnv: HOOK_KEY\n",
        )
        .unwrap();

        let config = ConfigLoader::load_with(&path, env(&[])).unwrap();
        assert_eq!(config.namespace.as_deref(), Some("kube-system"));
        assert_eq!(config.output, OutputFormat::Text);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.schema_fetch_timeout_secs, 30);
        assert_eq!(config.webhook.api_key_env.as_deref(), Some("HOOK_KEY"));
        assert_eq!(config.webhook.timeout_secs, 30);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "namespaces: typo\n").unwrap();
        assert!(ConfigLoader::load_with(&path, env(&[])).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "namespace: kube-system\noutput: text\n").unwrap();

        let config = ConfigLoader::load_with(
            &path,
            env(&[
                (NAMESPACE_ENV, "monitoring"),
                (OUTPUT_ENV, "json"),
                (WEBHOOK_URL_ENV, "http://localhost:5678/webhook"),
            ]),
        )
        .unwrap();

        assert_eq!(config.namespace.as_deref(), Some("monitoring"));
        assert_eq!(config.output, OutputFormat::Json);
        assert_eq!(config.webhook.url.as_deref(), Some("http://localhost:5678/webhook"));
    }

    #[test]
    fn test_empty_namespace_env_means_all() {
        let config = ConfigLoader::apply_env_overrides(
            Config {
                namespace: Some("kube-system".to_string()),
                ..Default::default()
            },
            env(&[(NAMESPACE_ENV, "")]),
        )
        .unwrap();
        assert!(config.namespace.is_none());
    }

    #[test]
    fn test_invalid_output_env() {
        assert!(ConfigLoader::apply_env_overrides(Config::default(), env(&[(OUTPUT_ENV, "xml")])).is_err());
    }

    #[test]
    fn test_webhook_api_key_resolution() {
        let config = Config {
            webhook: WebhookConfig {
                api_key_env: Some("HOOK_KEY".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        assert_eq!(
            ConfigLoader::webhook_api_key(&config, env(&[("HOOK_KEY", "from-config")])).as_deref(),
            Some("from-config")
        );
        assert_eq!(
            ConfigLoader::webhook_api_key(
                &config,
                env(&[("HOOK_KEY", "from-config"), (WEBHOOK_API_KEY_ENV, "direct")])
            )
            .as_deref(),
            Some("direct")
        );
        assert_eq!(ConfigLoader::webhook_api_key(&Config::default(), env(&[])), None);
    }

    #[test]
    fn test_validate() {
        assert!(ConfigLoader::validate(&Config::default()).is_ok());
        assert!(
            ConfigLoader::validate(&Config {
                concurrency: 0,
                ..Default::default()
            })
            .is_err()
        );

        let mut bad_hook = Config::default();
        bad_hook.webhook.url = Some("ftp://example.com".to_string());
        assert!(ConfigLoader::validate(&bad_hook).is_err());
    }
}
