//! Kubernetes client module
//!
//! Builds a client from the usual kubeconfig discovery chain and exposes
//! [`KubeCluster`], the live implementation of the read-only cluster
//! capabilities.

mod cluster;

pub use cluster::KubeCluster;

use anyhow::{Context, Result};
use kube::config::KubeConfigOptions;
use kube::{Client, Config};

/// Initialize and return a Kubernetes client
///
/// With no context the default loading strategy applies:
/// 1. In-cluster config (if running in a pod)
/// 2. KUBECONFIG environment variable
/// 3. ~/.kube/config
pub async fn create_client(context: Option<&str>) -> Result<Client> {
    let config = match context {
        Some(context) => {
            let options = KubeConfigOptions {
                context: Some(context.to_string()),
                ..Default::default()
            };
            Config::from_kubeconfig(&options)
                .await
                .with_context(|| format!("Failed to load kubeconfig context '{}'", context))?
        }
        None => Config::infer()
            .await
            .context("Failed to infer Kubernetes configuration")?,
    };

    tracing::debug!("Connecting to cluster at {}", config.cluster_url);
    Client::try_from(config).context("Failed to create Kubernetes client")
}
