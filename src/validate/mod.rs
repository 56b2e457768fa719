//! Matching and validation engine
//!
//! Every match runs four steps in a fixed order:
//!
//! 1. values schema validation
//! 2. policy checks against manifests and extra cluster objects
//! 3. cluster version compatibility
//! 4. required API version availability
//!
//! Steps report back through [`StepResult`]. The engine decides what a
//! failure means: a [`StepError::Fatal`] aborts the run, a
//! [`StepError::Degraded`] becomes a warning on the addon and the
//! remaining steps still run.

pub mod matches;
mod policy;
mod schema;
mod versions;

pub use matches::{Match, in_range, match_releases};
pub use policy::split_manifest;

use crate::chart::ChartFetcher;
use crate::cluster::{ClusterDiscovery, ObjectSource, ReleaseSource};
use crate::error::{CheckError, CheckResult};
use crate::policy::PolicyEvaluator;
use crate::release::ReleaseRecord;
use crate::report::{ActionItem, AddonOutput, Report};
use crate::version::{parse_tolerant, release_core};
use futures::{StreamExt, TryStreamExt};
use semver::Version;
use std::collections::BTreeMap;

/// What a step found
#[derive(Debug, Default)]
pub(crate) struct Findings {
    pub action_items: Vec<ActionItem>,
    pub warnings: Vec<String>,
}

/// Why a step could not complete
#[derive(Debug)]
pub(crate) enum StepError {
    /// The addon definition itself is broken
    Fatal(CheckError),
    /// Live state was unavailable; recorded as a warning
    Degraded(String),
}

pub(crate) type StepResult = Result<Findings, StepError>;

/// Engine settings
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Restrict cluster object lookups to one namespace
    pub namespace: Option<String>,
    /// Matches validated at once
    pub concurrency: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            namespace: None,
            concurrency: 1,
        }
    }
}

/// Cluster state read once per run and shared by every match
struct ClusterFacts {
    version: Result<Version, String>,
    api_versions: Result<Vec<String>, String>,
    namespaces: Result<Vec<String>, String>,
}

/// Runs the validation steps for each match
pub struct ValidationEngine<'a> {
    fetcher: &'a dyn ChartFetcher,
    evaluator: &'a dyn PolicyEvaluator,
    discovery: &'a dyn ClusterDiscovery,
    objects: &'a dyn ObjectSource,
    options: EngineOptions,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(
        fetcher: &'a dyn ChartFetcher,
        evaluator: &'a dyn PolicyEvaluator,
        discovery: &'a dyn ClusterDiscovery,
        objects: &'a dyn ObjectSource,
    ) -> Self {
        Self {
            fetcher,
            evaluator,
            discovery,
            objects,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate every match and fold the outputs into a report ordered by match key
    pub async fn run(&self, matches: BTreeMap<String, Match<'_>>) -> CheckResult<Report> {
        if matches.is_empty() {
            tracing::info!("No releases matched the bundle");
            return Ok(Report::default());
        }

        let needs_namespaces = matches
            .values()
            .any(|m| !m.addon.opa_checks.is_empty() && !m.addon.resources.is_empty());
        let facts = self.gather_facts(needs_namespaces).await;

        let outputs: Vec<AddonOutput> = futures::stream::iter(matches.into_values())
            .map(|m| self.validate_match(m, &facts))
            .buffered(self.options.concurrency.max(1))
            .try_collect()
            .await?;

        let report = Report::assemble(outputs);
        tracing::info!(
            "Validated {} addons, {} action items",
            report.addons.len(),
            report.action_item_count()
        );
        Ok(report)
    }

    async fn gather_facts(&self, needs_namespaces: bool) -> ClusterFacts {
        let version = match self.discovery.server_version().await {
            Ok(raw) => parse_tolerant(&raw)
                .map(|v| release_core(&v))
                .map_err(|e| format!("unable to parse cluster version {}: {}", raw, e)),
            Err(e) => Err(format!("unable to determine cluster version: {:#}", e)),
        };
        if let Ok(v) = &version {
            tracing::debug!("Cluster version {}", v);
        }

        let api_versions = self
            .discovery
            .list_api_versions()
            .await
            .map_err(|e| format!("unable to list cluster API versions: {:#}", e));

        let namespaces = match (&self.options.namespace, needs_namespaces) {
            (Some(ns), _) => Ok(vec![ns.clone()]),
            (None, true) => self
                .objects
                .list_namespaces()
                .await
                .map_err(|e| format!("{:#}", e)),
            (None, false) => Ok(Vec::new()),
        };

        ClusterFacts {
            version,
            api_versions,
            namespaces,
        }
    }

    async fn validate_match(&self, mut m: Match<'_>, facts: &ClusterFacts) -> CheckResult<AddonOutput> {
        let key = m.key();
        tracing::debug!("Validating {} against addon {}", key, m.addon.name);

        let outcome = schema::validate_values(&m, self.fetcher).await;
        apply(&mut m.output, &key, "schema", outcome)?;

        let outcome = policy::run_policy_checks(&m, self.evaluator, self.objects, &facts.namespaces).await;
        apply(&mut m.output, &key, "policy", outcome)?;

        let outcome = versions::check_cluster_version(&m, &facts.version);
        apply(&mut m.output, &key, "cluster version", outcome)?;

        let outcome = versions::check_api_versions(&m, &facts.api_versions);
        apply(&mut m.output, &key, "api versions", outcome)?;

        Ok(m.output)
    }
}

fn apply(output: &mut AddonOutput, key: &str, step: &str, outcome: StepResult) -> CheckResult<()> {
    match outcome {
        Ok(findings) => {
            output.action_items.extend(findings.action_items);
            output.warnings.extend(findings.warnings);
            Ok(())
        }
        Err(StepError::Degraded(warning)) => {
            tracing::warn!("{} check for {} degraded: {}", step, key, warning);
            output.warnings.push(warning);
            Ok(())
        }
        Err(StepError::Fatal(e)) => Err(e),
    }
}

/// Read the deployed releases; any failure is fatal for the run
pub async fn load_inventory(
    source: &dyn ReleaseSource,
    namespace: Option<&str>,
) -> CheckResult<Vec<ReleaseRecord>> {
    source
        .list_deployed_releases(namespace)
        .await
        .map_err(CheckError::Inventory)
}
