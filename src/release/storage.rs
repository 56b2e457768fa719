//! Helm v3 storage payload decoding
//!
//! Helm keeps one Secret per release generation. The `release` key holds
//! base64 text of a (usually gzipped) JSON document:
//!
//! base64 → gzip detection → decompress → JSON value → `ReleaseRecord`

use super::ReleaseRecord;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Label selector for live Helm v3 storage Secrets
pub const DEPLOYED_RELEASE_SELECTOR: &str = "owner=helm,status=deployed";

/// Secret data key holding the encoded release
pub const RELEASE_DATA_KEY: &str = "release";

const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

/// Decode the `release` value of a Helm storage Secret
pub fn decode_release(encoded: &[u8]) -> Result<ReleaseRecord> {
    use base64::Engine;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .context("Failed to decode base64 release data")?;

    let payload = if decoded.starts_with(&GZIP_MAGIC) {
        use std::io::Read;
        let mut decoder = flate2::read::GzDecoder::new(&decoded[..]);
        let mut buf = Vec::new();
        decoder
            .read_to_end(&mut buf)
            .context("Failed to decompress gzip release data")?;
        buf
    } else {
        decoded
    };

    let value: Value = serde_json::from_slice(&payload).context("Failed to parse release JSON")?;
    record_from_value(value)
}

/// Convert a generic release document into a `ReleaseRecord`
///
/// Unknown fields are ignored and missing optional fields default, so
/// storage format drift only fails when identity fields disappear.
pub fn record_from_value(value: Value) -> Result<ReleaseRecord> {
    let doc: StoredRelease =
        serde_json::from_value(value).context("Release JSON has an unexpected shape")?;

    if doc.name.is_empty() {
        anyhow::bail!("Release JSON missing 'name'");
    }

    let chart = doc.chart.unwrap_or_default();
    let metadata = chart.metadata.unwrap_or_default();

    Ok(ReleaseRecord {
        name: doc.name,
        namespace: doc.namespace,
        revision: doc.version,
        chart_name: metadata.name,
        chart_version: metadata.version,
        app_version: metadata.app_version,
        status: doc.info.map(|info| info.status).unwrap_or_default(),
        manifest: doc.manifest,
        values: doc.config.unwrap_or_default(),
        chart_values: chart.values.unwrap_or_default(),
    })
}

#[derive(Debug, Deserialize)]
struct StoredRelease {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    version: u32,
    #[serde(default)]
    info: Option<StoredInfo>,
    #[serde(default)]
    chart: Option<StoredChart>,
    #[serde(default)]
    config: Option<Map<String, Value>>,
    #[serde(default)]
    manifest: String,
}

#[derive(Debug, Default, Deserialize)]
struct StoredInfo {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Default, Deserialize)]
struct StoredChart {
    #[serde(default)]
    metadata: Option<StoredChartMetadata>,
    #[serde(default)]
    values: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredChartMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    app_version: String,
}
