//! Deployed Helm release snapshot
//!
//! `ReleaseRecord` is the tool's own release shape. It is built from the
//! Helm storage payload through a generic JSON value so that upstream
//! changes to Helm's release struct do not leak into the rest of the crate.

pub mod storage;
pub mod values;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Helm storage status of the generation that is currently live
pub const STATUS_DEPLOYED: &str = "deployed";

/// A deployed Helm release
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRecord {
    pub name: String,
    pub namespace: String,
    /// Storage generation (`sh.helm.release.v1.<name>.v<revision>`)
    pub revision: u32,
    pub chart_name: String,
    pub chart_version: String,
    pub app_version: String,
    pub status: String,
    /// Rendered manifest, multi-document YAML
    pub manifest: String,
    /// User-supplied values
    pub values: Map<String, Value>,
    /// Chart default values
    pub chart_values: Map<String, Value>,
}

impl ReleaseRecord {
    /// `namespace/name`
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn is_deployed(&self) -> bool {
        self.status == STATUS_DEPLOYED
    }
}
