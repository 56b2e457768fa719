//! Bundle loading and merging
//!
//! Explicitly requested files are loaded strictly: one unreadable, empty or
//! malformed file fails the whole load. Addon lists are concatenated in
//! input order.

use super::BundleSpec;
use super::defaults::EMBEDDED_BUNDLES;
use crate::error::{CheckError, CheckResult};
use std::path::{Path, PathBuf};

/// Bundle loader
pub struct BundleLoader;

impl BundleLoader {
    /// Load and merge bundle files, falling back to the built-in bundles
    pub fn load(paths: &[PathBuf]) -> CheckResult<BundleSpec> {
        if paths.is_empty() {
            tracing::debug!("No bundle files given, using built-in bundles");
            return Self::load_defaults();
        }

        let mut merged = BundleSpec::default();
        for path in paths {
            let bundle = Self::load_file(path)?;
            tracing::debug!(
                "Loaded {} addon(s) from {}",
                bundle.addons.len(),
                path.display()
            );
            merged.extend(bundle);
        }
        Ok(merged)
    }

    /// Load a single bundle file
    pub fn load_file(path: &Path) -> CheckResult<BundleSpec> {
        let contents = std::fs::read_to_string(path).map_err(|source| CheckError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        if contents.trim().is_empty() {
            return Err(CheckError::EmptyConfig {
                path: path.to_path_buf(),
            });
        }

        Self::parse(&contents, &path.display().to_string())
    }

    /// Parse bundle YAML; `origin` names the source in errors
    pub fn parse(contents: &str, origin: &str) -> CheckResult<BundleSpec> {
        serde_yaml::from_str(contents).map_err(|source| CheckError::ConfigParse {
            origin: origin.to_string(),
            source,
        })
    }

    /// Load the bundles compiled into the binary
    pub fn load_defaults() -> CheckResult<BundleSpec> {
        let mut merged = BundleSpec::default();
        for (name, contents) in EMBEDDED_BUNDLES {
            merged.extend(Self::parse(contents, &format!("built-in {}", name))?);
        }
        Ok(merged)
    }

    /// Find bundle files (`*.yaml`, `*.yml`) directly inside a directory
    ///
    /// Files are returned in lexical order so runs are reproducible.
    pub fn discover(dir: &Path) -> CheckResult<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir).map_err(|source| CheckError::ConfigRead {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CheckError::ConfigRead {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yaml" || ext == "yml");
            if is_yaml && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Convert raw bundle YAML into pretty JSON for webhook delivery
pub fn bundle_to_json(contents: &str) -> anyhow::Result<Vec<u8>> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(contents).map_err(|e| anyhow::anyhow!("failed to parse YAML: {}", e))?;
    let json = yaml_to_json(yaml)?;
    Ok(serde_json::to_vec_pretty(&json)?)
}

fn yaml_to_json(value: serde_yaml::Value) -> anyhow::Result<serde_json::Value> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Mapping(mapping) => {
            let mut object = serde_json::Map::new();
            for (key, value) in mapping {
                let Yaml::String(key) = key else {
                    anyhow::bail!("bundle contains a non-string key: {:?}", key);
                };
                object.insert(key, yaml_to_json(value)?);
            }
            serde_json::Value::Object(object)
        }
        Yaml::Sequence(items) => serde_json::Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<anyhow::Result<_>>()?,
        ),
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
        other => serde_json::to_value(other)?,
    })
}
