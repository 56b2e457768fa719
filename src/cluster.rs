//! Read-only cluster capabilities
//!
//! The matcher and validation engine never talk to the API server
//! directly. They go through these narrow traits, implemented for a live
//! cluster by [`crate::kube::KubeCluster`] and by in-memory fakes in tests.

use crate::release::ReleaseRecord;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Source of deployed Helm releases
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// List the deployed generation of every release, in all namespaces or only `namespace`
    async fn list_deployed_releases(&self, namespace: Option<&str>) -> Result<Vec<ReleaseRecord>>;
}

/// Cluster version and discovery information
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterDiscovery: Send + Sync {
    /// Version string reported by the API server (e.g. `v1.21.3-eks-1a2b`)
    async fn server_version(&self) -> Result<String>;

    /// Every group/version the API server serves (e.g. `v1`, `apps/v1`)
    async fn list_api_versions(&self) -> Result<Vec<String>>;
}

/// Arbitrary cluster objects
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectSource: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// List objects of one resource type in a namespace, as JSON maps
    async fn list_objects(&self, selector: &ResourceSelector, namespace: &str) -> Result<Vec<Value>>;
}

/// A group/version/resource triple
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceSelector {
    /// Empty for the core group
    pub group: String,
    pub version: String,
    /// Plural resource name, e.g. `deployments`
    pub resource: String,
}

impl ResourceSelector {
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for ResourceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.resource)
    }
}

impl FromStr for ResourceSelector {
    type Err = anyhow::Error;

    /// Parse `group/version/resource`, or `version/resource` for the core group
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        if parts.iter().any(|part| part.is_empty()) {
            anyhow::bail!("invalid resource selector '{}'", s);
        }
        match parts.as_slice() {
            [group, version, resource] => Ok(Self {
                group: group.to_string(),
                version: version.to_string(),
                resource: resource.to_string(),
            }),
            [version, resource] => Ok(Self {
                group: String::new(),
                version: version.to_string(),
                resource: resource.to_string(),
            }),
            _ => anyhow::bail!(
                "invalid resource selector '{}': expected group/version/resource or version/resource",
                s
            ),
        }
    }
}
