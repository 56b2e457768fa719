//! Cluster version and API availability checks

use super::{Findings, Match, StepError, StepResult};
use crate::error::CheckError;
use crate::report::ActionItem;
use crate::version::{parse_tolerant, release_core};
use semver::Version;

pub(super) const UNSUPPORTED_CLUSTER_TITLE: &str = "Unsupported cluster version";

/// Parse the bounds declared by the addon; unparseable bounds are fatal
fn declared_bound(m: &Match<'_>, bound: &'static str, value: Option<&str>) -> Result<Option<Version>, StepError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    parse_tolerant(raw).map(|v| Some(release_core(&v))).map_err(|_| {
        StepError::Fatal(CheckError::InvalidVersionConstraint {
            addon: m.addon.name.clone(),
            bound,
            value: raw.to_string(),
        })
    })
}

/// Compare the cluster version with the addon's inclusive `[min, max]` bounds
pub(super) fn check_cluster_version(m: &Match<'_>, cluster: &Result<Version, String>) -> StepResult {
    let range = &m.addon.compatible_k8s_versions;
    let max = declared_bound(m, "max", range.max.as_deref())?;
    let min = declared_bound(m, "min", range.min.as_deref())?;
    if max.is_none() && min.is_none() {
        return Ok(Findings::default());
    }

    let cluster = cluster.as_ref().map_err(|e| StepError::Degraded(e.clone()))?;
    let release = m.release;
    let mut findings = Findings::default();

    if max.is_some_and(|max| *cluster > max) {
        findings.action_items.push(ActionItem {
            resource_namespace: release.namespace.clone(),
            resource_name: release.name.clone(),
            title: UNSUPPORTED_CLUSTER_TITLE.to_string(),
            description: "The Kubernetes cluster version is greater than the maximum version specified in the bundle".to_string(),
            ..Default::default()
        });
    }

    if min.is_some_and(|min| *cluster < min) {
        findings.action_items.push(ActionItem {
            resource_namespace: release.namespace.clone(),
            resource_name: release.name.clone(),
            title: UNSUPPORTED_CLUSTER_TITLE.to_string(),
            description: "The Kubernetes cluster version is less than the minimum version specified in the bundle".to_string(),
            ..Default::default()
        });
    }

    Ok(findings)
}

/// Report every required API version the cluster does not serve
pub(super) fn check_api_versions(m: &Match<'_>, available: &Result<Vec<String>, String>) -> StepResult {
    let required = &m.addon.necessary_api_versions;
    if required.is_empty() {
        return Ok(Findings::default());
    }

    let available = available.as_ref().map_err(|e| StepError::Degraded(e.clone()))?;
    let release = m.release;
    let mut findings = Findings::default();

    for api_version in required {
        if available.contains(api_version) {
            tracing::trace!("Found required API version {}", api_version);
            continue;
        }
        findings.action_items.push(ActionItem {
            resource_namespace: release.namespace.clone(),
            resource_name: release.name.clone(),
            title: format!("API version {} is not available", api_version),
            description: format!("The Kubernetes cluster does not serve the API {}", api_version),
            ..Default::default()
        });
    }

    Ok(findings)
}
