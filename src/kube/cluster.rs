//! Live cluster access

use crate::cluster::{ClusterDiscovery, ObjectSource, ReleaseSource, ResourceSelector};
use crate::release::ReleaseRecord;
use crate::release::storage::{DEPLOYED_RELEASE_SELECTOR, RELEASE_DATA_KEY, decode_release};
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::{ApiResource, DynamicObject, ListParams};
use kube::core::{GroupVersion, TypeMeta};
use kube::{Api, Client, discovery};
use serde_json::Value;

/// Read-only view of a live cluster
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn decode_secret(secret: &Secret) -> Result<ReleaseRecord> {
        let name = secret.metadata.name.as_deref().unwrap_or("<unnamed>");
        let data = secret
            .data
            .as_ref()
            .and_then(|data| data.get(RELEASE_DATA_KEY))
            .ok_or_else(|| anyhow::anyhow!("Secret {} missing '{}' key", name, RELEASE_DATA_KEY))?;

        decode_release(&data.0).with_context(|| format!("Failed to decode Helm release Secret {}", name))
    }
}

#[async_trait]
impl ReleaseSource for KubeCluster {
    async fn list_deployed_releases(&self, namespace: Option<&str>) -> Result<Vec<ReleaseRecord>> {
        let namespaces = match namespace {
            Some(ns) => vec![ns.to_string()],
            None => self.list_namespaces().await?,
        };

        let mut secrets = Vec::new();
        for ns in &namespaces {
            let api: Api<Secret> = Api::namespaced(self.client.clone(), ns);
            let list = api
                .list(&ListParams::default().labels(DEPLOYED_RELEASE_SELECTOR))
                .await
                .with_context(|| format!("Failed to list Helm storage Secrets in {}", ns))?;
            tracing::debug!("Found {} release Secrets in {}", list.items.len(), ns);
            secrets.extend(list.items);
        }

        let mut releases = Vec::with_capacity(secrets.len());
        for secret in &secrets {
            let release = Self::decode_secret(secret)?;
            if release.is_deployed() {
                releases.push(release);
            } else {
                tracing::debug!("Skipping release {} with status {}", release.key(), release.status);
            }
        }
        releases.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));

        tracing::info!("Found {} deployed Helm releases", releases.len());
        Ok(releases)
    }
}

#[async_trait]
impl ClusterDiscovery for KubeCluster {
    async fn server_version(&self) -> Result<String> {
        let info = self
            .client
            .apiserver_version()
            .await
            .context("Failed to query API server version")?;
        Ok(info.git_version)
    }

    async fn list_api_versions(&self) -> Result<Vec<String>> {
        let core = self
            .client
            .list_core_api_versions()
            .await
            .context("Failed to list core API versions")?;
        let groups = self
            .client
            .list_api_groups()
            .await
            .context("Failed to list API groups")?;

        let mut versions = core.versions;
        versions.extend(
            groups
                .groups
                .into_iter()
                .flat_map(|group| group.versions.into_iter().map(|v| v.group_version)),
        );
        Ok(versions)
    }
}

#[async_trait]
impl ObjectSource for KubeCluster {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = api
            .list(&ListParams::default())
            .await
            .context("Failed to list namespaces")?;
        Ok(namespaces
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect())
    }

    async fn list_objects(&self, selector: &ResourceSelector, namespace: &str) -> Result<Vec<Value>> {
        let api_resource = self.resolve_resource(selector).await?;
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &api_resource);

        let list = api
            .list(&ListParams::default())
            .await
            .with_context(|| format!("Failed to list {} in {}", selector, namespace))?;

        typed_values(list.items, &api_resource)
    }
}

impl KubeCluster {
    /// Look up the kind served under a selector's plural resource name
    async fn resolve_resource(&self, selector: &ResourceSelector) -> Result<ApiResource> {
        let gv = GroupVersion::gv(&selector.group, &selector.version);
        let group = discovery::pinned_group(&self.client, &gv)
            .await
            .with_context(|| format!("Failed to discover resources in {}", selector.api_version()))?;

        group
            .recommended_resources()
            .into_iter()
            .map(|(resource, _)| resource)
            .find(|resource| resource.plural == selector.resource)
            .with_context(|| format!("Resource {} is not served by the cluster", selector))
    }
}

// List items come back without apiVersion and kind; policies key off both.
fn typed_values(items: Vec<DynamicObject>, resource: &ApiResource) -> Result<Vec<Value>> {
    items
        .into_iter()
        .map(|mut obj| {
            obj.types = Some(TypeMeta {
                api_version: resource.api_version.clone(),
                kind: resource.kind.clone(),
            });
            serde_json::to_value(&obj).context("Failed to serialize resource")
        })
        .collect()
}
