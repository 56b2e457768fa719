//! `check` command: validate deployed releases against addon bundles

use addon_preflight::bundle::BundleLoader;
use addon_preflight::chart::HttpChartFetcher;
use addon_preflight::config::{Config, ConfigLoader};
use addon_preflight::kube::{KubeCluster, create_client};
use addon_preflight::policy::RegoEvaluator;
use addon_preflight::report::{OutputFormat, Report};
use addon_preflight::validate::{EngineOptions, ValidationEngine, load_inventory, match_releases};
use addon_preflight::webhook::{WebhookClient, WebhookResponse};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

/// Arguments for `check`
#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Bundle file to load (repeatable); built-in bundles when none are given
    #[arg(long = "bundle", short = 'b')]
    pub bundles: Vec<PathBuf>,

    /// Directory of bundle files, loaded after explicit files
    #[arg(long)]
    pub bundle_dir: Option<PathBuf>,

    /// Only inspect this namespace
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    /// Report format
    #[arg(long, short = 'o', value_enum)]
    pub output: Option<OutputFormat>,

    /// Matches validated at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Also deliver the report to this webhook URL
    #[arg(long)]
    pub webhook: Option<String>,
}

impl CheckArgs {
    /// Layer the flags over the loaded configuration
    fn apply_to(&self, mut config: Config) -> Config {
        if let Some(namespace) = &self.namespace {
            config.namespace = Some(namespace.clone());
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(dir) = &self.bundle_dir {
            config.bundle_directory = Some(dir.clone());
        }
        if let Some(url) = &self.webhook {
            config.webhook.url = Some(url.clone());
        }
        config
    }

    fn bundle_paths(&self, config: &Config) -> Result<Vec<PathBuf>> {
        let mut paths = self.bundles.clone();
        if let Some(dir) = &config.bundle_directory {
            let found = BundleLoader::discover(dir)
                .with_context(|| format!("Failed to read bundle directory {}", dir.display()))?;
            tracing::debug!("Found {} bundle file(s) in {}", found.len(), dir.display());
            paths.extend(found);
        }
        Ok(paths)
    }
}

/// Run the full check and print the report
pub async fn run_check(args: CheckArgs, config: Config, context: Option<&str>) -> Result<()> {
    let config = args.apply_to(config);
    ConfigLoader::validate(&config).context("Invalid configuration")?;

    let bundle = BundleLoader::load(&args.bundle_paths(&config)?).context("Failed to load bundles")?;
    tracing::info!("Loaded {} addon(s)", bundle.addons.len());

    let client = create_client(context).await?;
    let cluster = KubeCluster::new(client);

    let releases = load_inventory(&cluster, config.namespace.as_deref())
        .await
        .context("Failed to read Helm releases")?;
    tracing::info!("Found {} deployed release(s)", releases.len());

    let matches = match_releases(&bundle, &releases);

    let fetcher = HttpChartFetcher::new(config.schema_fetch_timeout())?;
    let evaluator = RegoEvaluator::new();
    let mut report = ValidationEngine::new(&fetcher, &evaluator, &cluster, &cluster)
        .with_options(EngineOptions {
            namespace: config.namespace.clone(),
            concurrency: config.concurrency,
        })
        .run(matches)
        .await
        .context("Validation failed")?;

    if let Some(url) = &config.webhook.url {
        deliver(&mut report, url, &config).await?;
    }

    print!("{}", render(&report, config.output)?);
    Ok(())
}

async fn deliver(report: &mut Report, url: &str, config: &Config) -> Result<()> {
    let api_key = ConfigLoader::webhook_api_key(config, |name| std::env::var(name).ok());
    let client = WebhookClient::new(url, api_key, config.webhook.timeout())?;
    tracing::info!("Delivering report to {}", client.url());

    match client.send(&*report).await.context("Webhook delivery failed")? {
        WebhookResponse::Accepted => tracing::debug!("Webhook accepted the report"),
        WebhookResponse::Feedback(feedback) => {
            tracing::info!("Merging webhook feedback for {} addon(s)", feedback.addons.len());
            feedback.merge_into(report);
        }
    }
    Ok(())
}

fn render(report: &Report, format: OutputFormat) -> Result<String> {
    let mut out = report.render(format).context("Failed to render report")?;
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}
