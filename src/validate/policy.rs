//! Rego checks against rendered manifests and live objects

use super::{Findings, Match, StepError, StepResult};
use crate::cluster::{ObjectSource, ResourceSelector};
use crate::policy::PolicyEvaluator;
use crate::report::ActionItem;
use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

/// Split a multi-document YAML manifest into resource maps
///
/// Empty documents and documents that are not maps are dropped.
pub fn split_manifest(manifest: &str) -> Result<Vec<Value>> {
    let mut resources = Vec::new();
    for document in serde_yaml::Deserializer::from_str(manifest) {
        let value = Value::deserialize(document)?;
        if value.is_object() {
            resources.push(value);
        }
    }
    Ok(resources)
}

/// Evaluate every policy of the addon against every resource
pub(super) async fn run_policy_checks(
    m: &Match<'_>,
    evaluator: &dyn PolicyEvaluator,
    objects: &dyn ObjectSource,
    namespaces: &Result<Vec<String>, String>,
) -> StepResult {
    let addon = m.addon;
    if addon.opa_checks.is_empty() {
        return Ok(Findings::default());
    }

    let mut findings = Findings::default();
    let mut resources = split_manifest(&m.release.manifest).map_err(|e| {
        StepError::Degraded(format!(
            "unable to parse manifest of release {}: {}",
            m.release.key(),
            e
        ))
    })?;

    if !addon.resources.is_empty() {
        match namespaces {
            Ok(namespaces) => {
                let extra = collect_cluster_objects(&addon.resources, namespaces, objects, &mut findings).await;
                resources.extend(extra);
            }
            Err(e) => findings
                .warnings
                .push(format!("unable to list namespaces for cluster resources: {}", e)),
        }
    }

    tracing::debug!(
        "Evaluating {} policies against {} resources for {}",
        addon.opa_checks.len(),
        resources.len(),
        m.release.key()
    );

    for (index, policy) in addon.opa_checks.iter().enumerate() {
        for resource in &resources {
            let results = match evaluator.evaluate(policy, resource).await {
                Ok(results) => results,
                Err(e) => {
                    tracing::warn!(
                        "Policy {} of addon {} failed on {}: {:#}",
                        index,
                        addon.name,
                        describe(resource),
                        e
                    );
                    continue;
                }
            };

            for result in results {
                match serde_json::from_value::<ActionItem>(result) {
                    Ok(mut item) => {
                        backfill_resource(&mut item, resource);
                        findings.action_items.push(item);
                    }
                    Err(e) => {
                        tracing::warn!("Ignoring malformed policy result from addon {}: {}", addon.name, e)
                    }
                }
            }
        }
    }

    Ok(findings)
}

async fn collect_cluster_objects(
    selectors: &[String],
    namespaces: &[String],
    objects: &dyn ObjectSource,
    findings: &mut Findings,
) -> Vec<Value> {
    let mut parsed = Vec::with_capacity(selectors.len());
    for raw in selectors {
        match raw.parse::<ResourceSelector>() {
            Ok(selector) => parsed.push(selector),
            Err(e) => findings.warnings.push(e.to_string()),
        }
    }

    let mut collected = Vec::new();
    for namespace in namespaces {
        for selector in &parsed {
            match objects.list_objects(selector, namespace).await {
                Ok(items) => collected.extend(items.into_iter().map(|item| with_api_version(item, selector))),
                Err(e) => tracing::warn!("Unable to list {} in {}: {:#}", selector, namespace, e),
            }
        }
    }
    collected
}

fn with_api_version(mut item: Value, selector: &ResourceSelector) -> Value {
    if let Some(obj) = item.as_object_mut() {
        if !obj.get("apiVersion").is_some_and(Value::is_string) {
            obj.insert("apiVersion".to_string(), Value::String(selector.api_version()));
        }
    }
    item
}

/// Fill in resource identity the policy result left empty
fn backfill_resource(item: &mut ActionItem, resource: &Value) {
    let text = |value: Option<&Value>| value.and_then(Value::as_str).unwrap_or_default().to_string();
    let metadata = resource.get("metadata");

    if item.resource_kind.is_empty() {
        item.resource_kind = text(resource.get("kind"));
    }
    if item.resource_name.is_empty() {
        item.resource_name = text(metadata.and_then(|m| m.get("name")));
    }
    if item.resource_namespace.is_empty() {
        item.resource_namespace = text(metadata.and_then(|m| m.get("namespace")));
    }
}

fn describe(resource: &Value) -> String {
    let kind = resource.get("kind").and_then(Value::as_str).unwrap_or("?");
    let name = resource
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or("?");
    format!("{}/{}", kind, name)
}
