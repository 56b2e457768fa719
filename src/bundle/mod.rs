//! Addon bundle specification
//!
//! A bundle is a YAML document with a top-level `addons` list. Each addon
//! describes a Helm chart, the chart version range it applies to and the
//! checks to run against releases of that chart.

mod defaults;
pub mod loader;

pub use loader::{BundleLoader, bundle_to_json};

use serde::{Deserialize, Deserializer, Serialize};

/// Top-level bundle document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleSpec {
    #[serde(default)]
    pub addons: Vec<Addon>,
}

impl BundleSpec {
    /// Append the addons of another bundle, keeping order
    pub fn extend(&mut self, other: BundleSpec) {
        self.addons.extend(other.addons);
    }
}

/// A single addon entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Addon {
    /// Name of the addon (usually the release name)
    pub name: String,

    /// Source chart and repository
    #[serde(default)]
    pub source: ChartSource,

    /// Chart versions this addon applies to, `[start, end)`
    #[serde(default)]
    pub versions: VersionRange,

    /// General notes copied to the report
    #[serde(default)]
    pub notes: String,

    /// Static warnings copied to the report
    #[serde(default)]
    pub warnings: Vec<String>,

    /// Kubernetes versions the target chart version supports
    #[serde(default)]
    pub compatible_k8s_versions: K8sVersionRange,

    /// API group/versions that must be served by the cluster
    #[serde(default)]
    pub necessary_api_versions: Vec<String>,

    /// Embedded values.schema.json; when absent the upstream chart is consulted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values_schema: Option<String>,

    /// Embedded Rego modules
    #[serde(default)]
    pub opa_checks: Vec<String>,

    /// Extra cluster objects to evaluate, as `group/version/resource` or `version/resource`
    #[serde(default)]
    pub resources: Vec<String>,
}

impl Addon {
    /// Embedded schema, if one is set and non-blank
    pub fn embedded_schema(&self) -> Option<&str> {
        self.values_schema
            .as_deref()
            .filter(|schema| !schema.trim().is_empty())
    }
}

/// Chart identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSource {
    #[serde(default)]
    pub chart: String,
    #[serde(default)]
    pub repository: String,
}

/// Half-open chart version range
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
}

/// Inclusive Kubernetes version bounds; a missing bound is not checked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct K8sVersionRange {
    #[serde(
        default,
        deserialize_with = "optional_version_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub min: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_version_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub max: Option<String>,
}

// Requesting a string keeps the scalar text, so `max: 1.20` stays "1.20".
fn optional_version_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}
