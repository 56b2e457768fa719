//! Values schema validation

use super::{Findings, Match, StepError, StepResult};
use crate::chart::{ChartFetcher, fetch_values_schema};
use crate::error::CheckError;
use crate::release::values::coalesce_values;
use crate::report::ActionItem;
use serde_json::Value;

pub(super) const SCHEMA_FAILED_TITLE: &str = "Failed Schema Validation";
pub(super) const NO_SCHEMA_WARNING: &str = "no schema available, unable to validate release";

/// Validate the release's effective values against the addon's schema
///
/// An embedded schema that is not a valid JSON schema is fatal. A missing
/// or unusable upstream schema only produces a warning.
pub(super) async fn validate_values(m: &Match<'_>, fetcher: &dyn ChartFetcher) -> StepResult {
    let release = m.release;
    if release.values.is_empty() {
        tracing::debug!("No user values specified for release {}", release.key());
        return Ok(Findings::default());
    }

    let values = coalesce_values(&release.chart_values, &release.values);

    let schema = match m.addon.embedded_schema() {
        Some(embedded) => {
            let invalid = |reason: String| {
                StepError::Fatal(CheckError::InvalidSchema {
                    addon: m.addon.name.clone(),
                    release: release.key(),
                    reason,
                })
            };
            let schema: Value = serde_json::from_str(embedded).map_err(|e| invalid(e.to_string()))?;
            jsonschema::validator_for(&schema).map_err(|e| invalid(e.to_string()))?
        }
        None => {
            let addon = m.addon;
            let raw = fetch_values_schema(
                fetcher,
                &addon.source.repository,
                &addon.source.chart,
                &addon.versions.end,
            )
            .await
            .map_err(|e| {
                tracing::debug!("No schema found for release {}: {:#}", release.key(), e);
                StepError::Degraded(NO_SCHEMA_WARNING.to_string())
            })?;

            let schema: Value = serde_json::from_slice(&raw).map_err(|e| {
                tracing::debug!("Upstream schema for {} is not JSON: {}", addon.source.chart, e);
                StepError::Degraded(NO_SCHEMA_WARNING.to_string())
            })?;
            jsonschema::validator_for(&schema).map_err(|e| {
                tracing::debug!("Upstream schema for {} does not compile: {}", addon.source.chart, e);
                StepError::Degraded(NO_SCHEMA_WARNING.to_string())
            })?
        }
    };

    let errors: Vec<String> = schema
        .iter_errors(&values)
        .take(20)
        .map(|error| error.to_string())
        .collect();

    let mut findings = Findings::default();
    if errors.is_empty() {
        tracing::debug!("Schema validation passed for release {}", release.key());
    } else {
        tracing::debug!(
            "Schema validation failed for release {}: {}",
            release.key(),
            errors.join("; ")
        );
        findings.action_items.push(ActionItem {
            resource_namespace: release.namespace.clone(),
            resource_name: release.name.clone(),
            title: SCHEMA_FAILED_TITLE.to_string(),
            description: format!(
                "schema validation failed for this helm release: {}",
                errors.join("; ")
            ),
            ..Default::default()
        });
    }
    Ok(findings)
}
