//! `generate` command: summarize deployed releases and their upgrade status

use addon_preflight::bundle::{BundleLoader, bundle_to_json};
use addon_preflight::cluster::ClusterDiscovery;
use addon_preflight::config::{Config, ConfigLoader};
use addon_preflight::generate::{BundleOutput, InventorySummary, ReleaseOutput, single_release_bundle};
use addon_preflight::kube::{KubeCluster, create_client};
use addon_preflight::release::ReleaseRecord;
use addon_preflight::report::OutputFormat;
use addon_preflight::validate::load_inventory;
use addon_preflight::webhook::{WebhookClient, WebhookResponse};
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Arguments for `generate`
#[derive(Args, Debug, Default)]
pub struct GenerateArgs {
    /// Report on a single release by name
    #[arg(long)]
    pub release: Option<String>,

    /// Desired chart version for `--release`
    #[arg(long, short = 'V')]
    pub desired_version: Option<String>,

    /// Chart repository URL for `--release`
    #[arg(long, short = 'r')]
    pub repo: Option<String>,

    /// Bundle file describing the desired versions
    #[arg(long, short = 'b')]
    pub bundle: Option<PathBuf>,

    /// Deliver the result to this webhook URL
    #[arg(long)]
    pub webhook: Option<String>,

    /// Send the request document to the webhook without reading the cluster
    #[arg(long, requires = "webhook")]
    pub dry_run: bool,

    /// Output format
    #[arg(long, short = 'o', value_enum)]
    pub output: Option<OutputFormat>,

    /// Only inspect this namespace
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,
}

/// What `generate` was asked to do
#[derive(Debug, PartialEq)]
enum Mode {
    Inventory,
    Release {
        name: String,
        desired_version: String,
        repo: String,
    },
    Bundle(PathBuf),
}

impl GenerateArgs {
    fn mode(&self) -> Result<Mode> {
        if let Some(path) = &self.bundle {
            if self.release.is_some() {
                anyhow::bail!("--bundle and --release cannot be used together");
            }
            return Ok(Mode::Bundle(path.clone()));
        }

        match &self.release {
            Some(name) => {
                let (Some(desired_version), Some(repo)) = (&self.desired_version, &self.repo) else {
                    anyhow::bail!("--release requires --desired-version and --repo");
                };
                Ok(Mode::Release {
                    name: name.clone(),
                    desired_version: desired_version.clone(),
                    repo: repo.clone(),
                })
            }
            None if self.dry_run => anyhow::bail!("--dry-run requires --bundle or --release"),
            None => Ok(Mode::Inventory),
        }
    }
}

/// Run `generate`
pub async fn run_generate(args: GenerateArgs, config: Config, context: Option<&str>) -> Result<()> {
    let mode = args.mode()?;
    let format = args.output.unwrap_or(config.output);
    let namespace = args.namespace.clone().or_else(|| config.namespace.clone());
    let webhook = match &args.webhook {
        Some(url) => Some(webhook_client(url, &config)?),
        None => None,
    };

    if args.dry_run {
        let Some(client) = &webhook else {
            anyhow::bail!("--dry-run requires --webhook");
        };
        tracing::info!("Dry run: sending request document to {}", client.url());
        let body = match &mode {
            Mode::Bundle(path) => read_bundle_json(path)?,
            Mode::Release {
                name,
                desired_version,
                repo,
            } => serde_json::to_vec(&single_release_bundle(name, desired_version, repo))?,
            Mode::Inventory => anyhow::bail!("--dry-run requires --bundle or --release"),
        };
        let response = client.send_json(body).await.context("Webhook delivery failed")?;
        report_feedback(&response);
        return Ok(());
    }

    if let (Mode::Bundle(path), Some(client)) = (&mode, &webhook) {
        let body = read_bundle_json(path)?;
        let response = client.send_json(body).await.context("Webhook delivery failed")?;
        report_feedback(&response);
        return Ok(());
    }

    let client = create_client(context).await?;
    let cluster = KubeCluster::new(client);
    let cluster_version = cluster
        .server_version()
        .await
        .context("Failed to read cluster version")?;
    let releases = load_inventory(&cluster, namespace.as_deref())
        .await
        .context("Failed to read Helm releases")?;

    match mode {
        Mode::Inventory => {
            let summary = InventorySummary::new(cluster_version, &releases);
            print_output(&summary, format, || summary.to_text())
        }
        Mode::Bundle(path) => {
            let bundle = BundleLoader::load_file(&path).context("Failed to load bundle")?;
            let output = BundleOutput::new(&cluster_version, &bundle, &releases);
            print_output(&output, format, || output.to_text())
        }
        Mode::Release {
            name,
            desired_version,
            repo,
        } => {
            let release = find_release(&releases, &name)?;
            let output = ReleaseOutput::for_release(&cluster_version, release, &desired_version, &repo);
            if let Some(client) = &webhook {
                let response = client.send(&output).await.context("Webhook delivery failed")?;
                report_feedback(&response);
            }
            print_output(&output, format, || output.to_text())
        }
    }
}

fn webhook_client(url: &str, config: &Config) -> Result<WebhookClient> {
    let api_key = ConfigLoader::webhook_api_key(config, |name| std::env::var(name).ok());
    Ok(WebhookClient::new(url, api_key, config.webhook.timeout())?)
}

fn read_bundle_json(path: &Path) -> Result<Vec<u8>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read bundle file: {}", path.display()))?;
    bundle_to_json(&raw).with_context(|| format!("Failed to convert bundle {}", path.display()))
}

fn find_release<'a>(releases: &'a [ReleaseRecord], name: &str) -> Result<&'a ReleaseRecord> {
    releases
        .iter()
        .find(|r| r.name == name)
        .with_context(|| format!("Helm release '{}' not found in the cluster", name))
}

fn report_feedback(response: &WebhookResponse) {
    match response {
        WebhookResponse::Accepted => tracing::info!("Webhook accepted the request"),
        WebhookResponse::Feedback(feedback) => {
            for (addon, warning) in feedback.warnings() {
                eprintln!("warning: {}: {}", addon, warning);
            }
        }
    }
}

fn print_output<T, F>(value: &T, format: OutputFormat, text: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce() -> String,
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
            println!("{}", json);
        }
        OutputFormat::Text => print!("{}", text()),
    }
    Ok(())
}
