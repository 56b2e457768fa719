//! Policy evaluation
//!
//! Bundles embed Rego modules. Each module is evaluated once per resource
//! with the resource as `input`; the module reports findings through an
//! `actionItems` (or `actionItem`) rule holding objects shaped like
//! [`crate::report::ActionItem`].

mod rego;

pub use rego::RegoEvaluator;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Evaluates a policy against one resource
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Return the raw findings produced by `policy` for `resource`
    async fn evaluate(&self, policy: &str, resource: &Value) -> Result<Vec<Value>>;
}
