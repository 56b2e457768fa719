//! In-process Rego evaluation backed by `regorus`

use super::PolicyEvaluator;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Rules consulted for findings, in order
const FINDING_RULES: &[&str] = &["actionItems", "actionItem"];

/// Rego evaluator
///
/// A fresh engine is built per evaluation so policies never see each
/// other's rules or a previous input.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegoEvaluator;

impl RegoEvaluator {
    pub fn new() -> Self {
        Self
    }

    fn evaluate_sync(policy: &str, resource: &Value) -> Result<Vec<Value>> {
        let package = package_name(policy)
            .ok_or_else(|| anyhow::anyhow!("policy has no package declaration"))?;

        let mut engine = regorus::Engine::new();
        engine
            .add_policy(format!("{}.rego", package), policy.to_string())
            .map_err(|e| anyhow::anyhow!("failed to compile policy {}: {}", package, e))?;

        let input = regorus::Value::from_json_str(&resource.to_string())
            .map_err(|e| anyhow::anyhow!("failed to convert resource to policy input: {}", e))?;
        engine.set_input(input);

        for rule in FINDING_RULES {
            let query = format!("data.{}.{}", package, rule);
            let results = engine
                .eval_query(query.clone(), false)
                .map_err(|e| anyhow::anyhow!("failed to evaluate {}: {}", query, e))?;

            let Some(value) = results
                .result
                .into_iter()
                .next()
                .and_then(|r| r.expressions.into_iter().next())
                .map(|expr| expr.value)
            else {
                continue;
            };
            if value == regorus::Value::Undefined {
                continue;
            }

            let json = value
                .to_json_str()
                .map_err(|e| anyhow::anyhow!("failed to read {} result: {}", query, e))?;
            let findings: Value =
                serde_json::from_str(&json).with_context(|| format!("invalid {} result", query))?;
            return Ok(flatten_findings(findings));
        }

        Ok(Vec::new())
    }
}

#[async_trait]
impl PolicyEvaluator for RegoEvaluator {
    async fn evaluate(&self, policy: &str, resource: &Value) -> Result<Vec<Value>> {
        Self::evaluate_sync(policy, resource)
    }
}

/// Extract the dotted package path from a Rego module
fn package_name(policy: &str) -> Option<String> {
    policy
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("package "))
        .map(|rest| rest.trim().to_string())
        .filter(|name| !name.is_empty())
}

// Sets serialise as arrays; a single object rule is treated as one finding.
fn flatten_findings(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    }
}
