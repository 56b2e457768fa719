//! Release version summaries
//!
//! `generate` reports what is deployed without running the validation
//! steps: either a plain inventory or, per addon, how far the deployed
//! chart is from the addon's target version.

use crate::bundle::{Addon, BundleSpec};
use crate::release::ReleaseRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt::Write as _;

/// Deployed release as listed by `generate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseSummary {
    pub name: String,
    pub namespace: String,
    pub version: String,
    pub app_version: String,
    pub status: String,
}

/// Cluster version plus every deployed release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub cluster_version: String,
    pub helm_releases: Vec<ReleaseSummary>,
}

impl InventorySummary {
    pub fn new(cluster_version: impl Into<String>, releases: &[ReleaseRecord]) -> Self {
        Self {
            cluster_version: cluster_version.into(),
            helm_releases: releases
                .iter()
                .map(|r| ReleaseSummary {
                    name: r.name.clone(),
                    namespace: r.namespace.clone(),
                    version: r.chart_version.clone(),
                    app_version: r.app_version.clone(),
                    status: r.status.clone(),
                })
                .collect(),
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Cluster Version: {}", self.cluster_version);
        let _ = writeln!(out, "Helm Releases ({}):", self.helm_releases.len());
        for r in &self.helm_releases {
            let _ = writeln!(
                out,
                "  - {}/{} (Chart: {}, App: {}, Status: {})",
                r.namespace, r.name, r.version, r.app_version, r.status
            );
        }
        out
    }
}

/// Upgrade status of one release
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseOutput {
    pub cluster_version: String,
    pub release_name: String,
    pub namespace: String,
    pub current_version: String,
    pub app_version: String,
    pub status: String,
    pub desired_version: String,
    pub repo_url: String,
    pub upgradeable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReleaseOutput {
    pub fn for_release(
        cluster_version: &str,
        release: &ReleaseRecord,
        desired_version: &str,
        repo_url: &str,
    ) -> Self {
        Self {
            cluster_version: cluster_version.to_string(),
            release_name: release.name.clone(),
            namespace: release.namespace.clone(),
            current_version: release.chart_version.clone(),
            app_version: release.app_version.clone(),
            status: release.status.clone(),
            desired_version: desired_version.to_string(),
            repo_url: repo_url.to_string(),
            upgradeable: is_upgradeable(&release.chart_version, desired_version),
            error: None,
        }
    }

    /// Output for an addon whose release is not deployed
    pub fn missing(cluster_version: &str, addon: &Addon) -> Self {
        Self {
            cluster_version: cluster_version.to_string(),
            release_name: addon.name.clone(),
            desired_version: addon.versions.end.clone(),
            repo_url: addon.source.repository.clone(),
            error: Some(format!("Helm release '{}' not found in the cluster", addon.name)),
            ..Default::default()
        }
    }

    fn write_text(&self, out: &mut String, with_cluster: bool) {
        if with_cluster {
            let _ = writeln!(out, "Cluster Version: {}", self.cluster_version);
        }
        let _ = writeln!(out, "Release: {}", self.release_name);
        if let Some(error) = &self.error {
            let _ = writeln!(out, "Error: {}", error);
            return;
        }
        let _ = writeln!(out, "Namespace: {}", self.namespace);
        let _ = writeln!(out, "Current Version: {}", self.current_version);
        let _ = writeln!(out, "App Version: {}", self.app_version);
        let _ = writeln!(out, "Status: {}", self.status);
        let _ = writeln!(out, "Desired Version: {}", self.desired_version);
        let _ = writeln!(out, "Repo URL: {}", self.repo_url);
        let _ = writeln!(out, "Upgradeable: {}", self.upgradeable);
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out, true);
        out
    }
}

/// Upgrade status of every addon in a bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleOutput {
    pub cluster_version: String,
    pub releases: Vec<ReleaseOutput>,
}

impl BundleOutput {
    /// One entry per addon, looked up by release name
    pub fn new(cluster_version: &str, bundle: &BundleSpec, releases: &[ReleaseRecord]) -> Self {
        let outputs = bundle
            .addons
            .iter()
            .map(|addon| match releases.iter().find(|r| r.name == addon.name) {
                Some(release) => ReleaseOutput::for_release(
                    cluster_version,
                    release,
                    &addon.versions.end,
                    &addon.source.repository,
                ),
                None => ReleaseOutput::missing(cluster_version, addon),
            })
            .collect();

        Self {
            cluster_version: cluster_version.to_string(),
            releases: outputs,
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Cluster Version: {}", self.cluster_version);
        let _ = writeln!(out, "Bundle Releases ({}):\n", self.releases.len());
        for (i, release) in self.releases.iter().enumerate() {
            if i > 0 {
                out.push_str("\n---\n\n");
            }
            release.write_text(&mut out, false);
        }
        out
    }
}

/// Whether current and desired versions differ once a leading `v` is dropped
pub fn is_upgradeable(current: &str, desired: &str) -> bool {
    current.trim_start_matches('v') != desired.trim_start_matches('v')
}

/// Minimal bundle document describing a single release, for webhook dry runs
pub fn single_release_bundle(release_name: &str, desired_version: &str, repo_url: &str) -> Value {
    json!({
        "addons": [{
            "name": release_name,
            "versions": { "end": desired_version },
            "source": { "chart": release_name, "repository": repo_url }
        }]
    })
}
