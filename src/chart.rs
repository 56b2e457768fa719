//! Upstream chart archives
//!
//! When a bundle does not embed a values schema, the packaged chart is
//! downloaded from its repository and `values.schema.json` is pulled out
//! of the gzipped tarball.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Read;
use std::time::Duration;

/// Default timeout for chart downloads
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches raw bytes from a URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChartFetcher: Send + Sync {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP chart fetcher
pub struct HttpChartFetcher {
    client: reqwest::Client,
}

impl HttpChartFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("addon-preflight/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::debug!("Created chart fetcher with {:?} timeout", timeout);
        Ok(Self { client })
    }
}

#[async_trait]
impl ChartFetcher for HttpChartFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!("Fetching chart archive: {}", url);

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch: {}", url))?;

        if !resp.status().is_success() {
            anyhow::bail!("HTTP request failed: {} (status: {})", url, resp.status());
        }

        let body = resp
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body from: {}", url))?;
        Ok(body.to_vec())
    }
}

/// URL of a packaged chart: `{repository}/{chart}-{version}.tgz`
pub fn chart_archive_url(repository: &str, chart: &str, version: &str) -> String {
    format!("{}/{}-{}.tgz", repository.trim_end_matches('/'), chart, version)
}

/// Extract `{chart}/values.schema.json` from a gzipped chart tarball
pub fn extract_values_schema(archive: &[u8], chart: &str) -> Result<Vec<u8>> {
    let wanted = format!("{}/values.schema.json", chart);
    let decoder = flate2::read::GzDecoder::new(archive);
    let mut tarball = tar::Archive::new(decoder);

    for entry in tarball.entries().context("Failed to read chart archive")? {
        let mut entry = entry.context("Failed to read chart archive entry")?;
        let is_schema = entry
            .path()
            .map(|path| path.to_string_lossy() == wanted.as_str())
            .unwrap_or(false);
        if is_schema {
            let mut schema = Vec::new();
            entry
                .read_to_end(&mut schema)
                .context("Failed to read values.schema.json")?;
            tracing::trace!("Found schema in upstream chart {}", chart);
            return Ok(schema);
        }
    }

    anyhow::bail!("no values schema found for chart {}", chart)
}

/// Download a chart and return its values schema
pub async fn fetch_values_schema(
    fetcher: &dyn ChartFetcher,
    repository: &str,
    chart: &str,
    version: &str,
) -> Result<Vec<u8>> {
    let url = chart_archive_url(repository, chart, version);
    tracing::debug!("Checking upstream of {} for values.schema.json", chart);
    let archive = fetcher.fetch_bytes(&url).await?;
    extract_values_schema(&archive, chart)
}
