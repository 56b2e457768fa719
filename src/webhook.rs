//! Webhook delivery
//!
//! Payloads are POSTed as JSON. A receiver may answer with plain text,
//! which is taken as accepted, or with a JSON document carrying a `status`
//! and per-addon warnings to merge back into the report.

use crate::error::{CheckError, CheckResult};
use crate::report::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Header carrying the optional API key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Status a JSON receiver must report
pub const SUCCESS_STATUS: &str = "success";

/// Check that a webhook URL is absolute http(s) with a host
pub fn validate_webhook_url(raw: &str) -> CheckResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| CheckError::Webhook(format!("invalid webhook URL {}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(CheckError::Webhook(format!(
            "webhook URL must use http or https scheme, got: {}",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(CheckError::Webhook("webhook URL must have a valid host".to_string()));
    }
    Ok(url)
}

/// Outcome of a delivery
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookResponse {
    /// 2xx without a JSON status document
    Accepted,
    /// 2xx JSON document reporting success
    Feedback(WebhookFeedback),
}

/// JSON reply from a receiver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookFeedback {
    pub status: String,
    #[serde(default)]
    pub addons: Vec<WebhookAddon>,
}

/// Warnings a receiver attached to one addon
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookAddon {
    pub name: String,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl WebhookFeedback {
    /// Merge returned warnings into addons of the same name, skipping duplicates
    pub fn merge_into(&self, report: &mut Report) {
        for feedback in &self.addons {
            let mut found = false;
            for addon in report.addons.iter_mut().filter(|a| a.name == feedback.name) {
                addon.merge_warnings(feedback.warnings.iter().cloned());
                found = true;
            }
            if !found {
                tracing::debug!("Webhook returned warnings for unknown addon {}", feedback.name);
            }
        }
    }

    /// Every returned warning as `(addon, warning)` pairs
    pub fn warnings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.addons.iter().flat_map(|addon| {
            addon
                .warnings
                .iter()
                .map(move |warning| (addon.name.as_str(), warning.as_str()))
        })
    }
}

/// Interpret a 2xx response body
pub fn parse_response(body: &[u8]) -> CheckResult<WebhookResponse> {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return Ok(WebhookResponse::Accepted);
    };
    if value.get("status").is_none() {
        return Ok(WebhookResponse::Accepted);
    }

    let feedback: WebhookFeedback = serde_json::from_value(value)
        .map_err(|e| CheckError::Webhook(format!("unexpected webhook response: {}", e)))?;
    if feedback.status != SUCCESS_STATUS {
        return Err(CheckError::Webhook(format!(
            "webhook returned status '{}'",
            feedback.status
        )));
    }
    Ok(WebhookResponse::Feedback(feedback))
}

/// Client for a single webhook endpoint
pub struct WebhookClient {
    client: reqwest::Client,
    url: Url,
    api_key: Option<String>,
}

impl WebhookClient {
    pub fn new(url: &str, api_key: Option<String>, timeout: Duration) -> CheckResult<Self> {
        let url = validate_webhook_url(url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("addon-preflight/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CheckError::Webhook(format!("failed to create HTTP client: {}", e)))?;

        tracing::debug!("Created webhook client for: {}", url);
        Ok(Self {
            client,
            url,
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Serialize `payload` and deliver it
    pub async fn send<T: Serialize + ?Sized>(&self, payload: &T) -> CheckResult<WebhookResponse> {
        let body = serde_json::to_vec(payload)?;
        self.send_json(body).await
    }

    /// Deliver an already encoded JSON body
    pub async fn send_json(&self, body: Vec<u8>) -> CheckResult<WebhookResponse> {
        tracing::info!("Sending {} bytes to webhook: {}", body.len(), self.url);

        let mut req = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| CheckError::Webhook(format!("failed to send webhook request: {}", e)))?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| CheckError::Webhook(format!("failed to read webhook response: {}", e)))?;

        if !status.is_success() {
            return Err(CheckError::Webhook(format!(
                "webhook returned non-success status: {}, response: {}",
                status.as_u16(),
                String::from_utf8_lossy(&body)
            )));
        }

        tracing::info!("Delivered to webhook: {} (status: {})", self.url, status.as_u16());
        parse_response(&body)
    }
}
