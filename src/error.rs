//! Error types for a check run
//!
//! Only structural failures live here. Anything a single validation step can
//! recover from is downgraded to a warning on the affected addon instead.

use std::path::PathBuf;

/// Errors that abort a run
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("unable to read bundle file {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bundle file {path} is empty")]
    EmptyConfig { path: PathBuf },

    #[error("unable to parse bundle {origin}")]
    ConfigParse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to list Helm releases")]
    Inventory(#[source] anyhow::Error),

    #[error("invalid values schema for addon {addon} (release {release}): {reason}")]
    InvalidSchema {
        addon: String,
        release: String,
        reason: String,
    },

    #[error("invalid compatible_k8s_versions.{bound} '{value}' for addon {addon}")]
    InvalidVersionConstraint {
        addon: String,
        bound: &'static str,
        value: String,
    },

    #[error("webhook delivery failed: {0}")]
    Webhook(String),

    #[error("unable to render report")]
    Output(#[from] serde_json::Error),
}

/// Result type for check operations
pub type CheckResult<T> = Result<T, CheckError>;
