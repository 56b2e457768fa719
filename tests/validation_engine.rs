//! Validation engine tests
//!
//! Runs inventory, matching and every validation step against in-memory
//! cluster, chart and policy implementations.

use addon_preflight::bundle::{Addon, BundleLoader, BundleSpec};
use addon_preflight::chart::ChartFetcher;
use addon_preflight::cluster::{ClusterDiscovery, ObjectSource, ReleaseSource, ResourceSelector};
use addon_preflight::error::CheckError;
use addon_preflight::policy::{PolicyEvaluator, RegoEvaluator};
use addon_preflight::release::ReleaseRecord;
use addon_preflight::report::Report;
use addon_preflight::validate::{EngineOptions, ValidationEngine, load_inventory, match_releases};
use anyhow::Result;
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

const METRICS_SERVER_BUNDLE: &str = r#"
addons:
  - name: metrics-server
    source:
      chart: metrics-server
      repository: https://charts.example.com
    versions:
      start: 5.10.2
      end: 5.10.14
    notes: Aggregates resource usage data for the Horizontal Pod Autoscaler.
    compatible_k8s_versions:
      min: "1.18"
      max: "1.20"
    necessary_api_versions:
      - apiregistration.k8s.io/v1
"#;

const LIMITS_POLICY: &str = r#"
package limits

actionItems[item] {
  input.kind == "Deployment"
  container := input.spec.template.spec.containers[_]
  not container.resources.limits
  item := {
    "title": "Container without resource limits",
    "description": concat("", ["container ", container.name, " has no resource limits"]),
    "severity": 0.4,
    "category": "Reliability"
  }
}
"#;

const REPLICAS_SCHEMA: &str = r#"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "type": "object",
  "properties": {
    "replicas": { "type": "integer" }
  }
}"#;

/// In-memory cluster
#[derive(Default)]
struct FakeCluster {
    version: Option<String>,
    api_versions: Vec<String>,
    namespaces: Vec<String>,
    releases: Vec<ReleaseRecord>,
    objects: HashMap<(String, String), Vec<Value>>,
    listed: Mutex<Vec<String>>,
}

impl FakeCluster {
    fn new(version: &str, api_versions: &[&str]) -> Self {
        Self {
            version: Some(version.to_string()),
            api_versions: api_versions.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ReleaseSource for FakeCluster {
    async fn list_deployed_releases(&self, namespace: Option<&str>) -> Result<Vec<ReleaseRecord>> {
        Ok(self
            .releases
            .iter()
            .filter(|r| namespace.is_none_or(|ns| r.namespace == ns))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ClusterDiscovery for FakeCluster {
    async fn server_version(&self) -> Result<String> {
        self.version
            .clone()
            .ok_or_else(|| anyhow::anyhow!("connection refused"))
    }

    async fn list_api_versions(&self) -> Result<Vec<String>> {
        Ok(self.api_versions.clone())
    }
}

#[async_trait]
impl ObjectSource for FakeCluster {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(self.namespaces.clone())
    }

    async fn list_objects(&self, selector: &ResourceSelector, namespace: &str) -> Result<Vec<Value>> {
        self.listed
            .lock()
            .unwrap()
            .push(format!("{}@{}", selector, namespace));
        Ok(self
            .objects
            .get(&(selector.resource.clone(), namespace.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Serves chart archives by URL; anything else is a 404
#[derive(Default)]
struct FakeCharts {
    archives: HashMap<String, Vec<u8>>,
}

#[async_trait]
impl ChartFetcher for FakeCharts {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.archives
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("HTTP request failed: {} (status: 404 Not Found)", url))
    }
}

/// Reports nothing
struct NoFindings;

#[async_trait]
impl PolicyEvaluator for NoFindings {
    async fn evaluate(&self, _policy: &str, _resource: &Value) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }
}

fn chart_archive(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

fn metrics_server_bundle() -> BundleSpec {
    BundleLoader::parse(METRICS_SERVER_BUNDLE, "test").unwrap()
}

fn metrics_server_release() -> ReleaseRecord {
    ReleaseRecord {
        name: "metrics-server".to_string(),
        namespace: "kube-system".to_string(),
        revision: 3,
        chart_name: "metrics-server".to_string(),
        chart_version: "5.10.10".to_string(),
        app_version: "0.5.2".to_string(),
        status: "deployed".to_string(),
        ..Default::default()
    }
}

fn deployment(name: &str, namespace: &str, limits: bool) -> Value {
    let resources = if limits {
        json!({ "limits": { "cpu": "100m" } })
    } else {
        json!({})
    };
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": { "name": name, "namespace": namespace },
        "spec": { "template": { "spec": { "containers": [
            { "name": name, "image": "example/app", "resources": resources }
        ] } } }
    })
}

async fn check(
    bundle: &BundleSpec,
    cluster: &FakeCluster,
    charts: &FakeCharts,
    evaluator: &dyn PolicyEvaluator,
    options: EngineOptions,
) -> Result<Report, CheckError> {
    let releases = load_inventory(cluster, options.namespace.as_deref()).await?;
    let matches = match_releases(bundle, &releases);
    ValidationEngine::new(charts, evaluator, cluster, cluster)
        .with_options(options)
        .run(matches)
        .await
}

#[tokio::test]
async fn test_supported_cluster_version() {
    let mut cluster = FakeCluster::new("v1.19.0", &["v1", "apiregistration.k8s.io/v1"]);
    cluster.releases = vec![metrics_server_release()];

    let report = check(
        &metrics_server_bundle(),
        &cluster,
        &FakeCharts::default(),
        &NoFindings,
        EngineOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(report.addons.len(), 1);
    let addon = &report.addons[0];
    assert_eq!(addon.name, "metrics-server");
    assert_eq!(addon.versions.current, "5.10.10");
    assert_eq!(addon.versions.upgrade, "5.10.14");
    assert_eq!(
        addon.notes,
        "Aggregates resource usage data for the Horizontal Pod Autoscaler."
    );
    assert!(addon.action_items.is_empty());
    assert!(addon.warnings.is_empty());
}

#[tokio::test]
async fn test_cluster_newer_than_supported() {
    let mut cluster = FakeCluster::new("v1.21.0", &["v1", "apiregistration.k8s.io/v1"]);
    cluster.releases = vec![metrics_server_release()];

    let report = check(
        &metrics_server_bundle(),
        &cluster,
        &FakeCharts::default(),
        &NoFindings,
        EngineOptions::default(),
    )
    .await
    .unwrap();

    let items = &report.addons[0].action_items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Unsupported cluster version");
    assert_eq!(items[0].resource_namespace, "kube-system");
    assert_eq!(items[0].resource_name, "metrics-server");
    assert!(items[0].description.contains("greater than the maximum"));

    let json: Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["addons"][0]["actionItems"][0]["resourceNamespace"], "kube-system");
    assert_eq!(json["addons"][0]["upgradeConfidence"], 0);
}

#[tokio::test]
async fn test_missing_api_version() {
    let mut cluster = FakeCluster::new("v1.19.4", &["v1", "apps/v1"]);
    cluster.releases = vec![metrics_server_release()];

    let report = check(
        &metrics_server_bundle(),
        &cluster,
        &FakeCharts::default(),
        &NoFindings,
        EngineOptions::default(),
    )
    .await
    .unwrap();

    let items = &report.addons[0].action_items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "API version apiregistration.k8s.io/v1 is not available");
}

#[tokio::test]
async fn test_unreachable_cluster_version_is_a_warning() {
    let mut cluster = FakeCluster {
        version: None,
        api_versions: vec!["apiregistration.k8s.io/v1".to_string()],
        ..Default::default()
    };
    cluster.releases = vec![metrics_server_release()];

    let report = check(
        &metrics_server_bundle(),
        &cluster,
        &FakeCharts::default(),
        &NoFindings,
        EngineOptions::default(),
    )
    .await
    .unwrap();

    let addon = &report.addons[0];
    assert!(addon.action_items.is_empty());
    assert_eq!(addon.warnings.len(), 1);
    assert!(addon.warnings[0].contains("cluster version"));
}

#[tokio::test]
async fn test_invalid_version_constraint_is_fatal() {
    let mut bundle = metrics_server_bundle();
    bundle.addons[0].compatible_k8s_versions.max = Some("one.twenty".to_string());
    let mut cluster = FakeCluster::new("v1.19.0", &["apiregistration.k8s.io/v1"]);
    cluster.releases = vec![metrics_server_release()];

    let err = check(
        &bundle,
        &cluster,
        &FakeCharts::default(),
        &NoFindings,
        EngineOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CheckError::InvalidVersionConstraint { bound: "max", .. }));
}

#[tokio::test]
async fn test_embedded_schema() {
    let mut bundle = metrics_server_bundle();
    bundle.addons[0].values_schema = Some(REPLICAS_SCHEMA.to_string());
    let mut cluster = FakeCluster::new("v1.19.0", &["apiregistration.k8s.io/v1"]);

    let mut valid = metrics_server_release();
    valid.namespace = "monitoring".to_string();
    valid.chart_values = object(json!({ "replicas": 1 }));
    valid.values = object(json!({ "replicas": 2 }));

    let mut invalid = metrics_server_release();
    invalid.chart_values = object(json!({ "replicas": 1 }));
    invalid.values = object(json!({ "replicas": "two" }));

    cluster.releases = vec![valid, invalid];

    let report = check(
        &bundle,
        &cluster,
        &FakeCharts::default(),
        &NoFindings,
        EngineOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(report.addons.len(), 2);
    // kube-system sorts before monitoring
    let failed = &report.addons[0].action_items;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].title, "Failed Schema Validation");
    assert_eq!(failed[0].resource_namespace, "kube-system");
    assert!(
        failed[0]
            .description
            .starts_with("schema validation failed for this helm release: ")
    );
    assert!(report.addons[1].action_items.is_empty());
}

#[tokio::test]
async fn test_invalid_embedded_schema_is_fatal() {
    let mut bundle = metrics_server_bundle();
    bundle.addons[0].values_schema = Some("{ not json".to_string());
    let mut release = metrics_server_release();
    release.values = object(json!({ "replicas": 2 }));
    let mut cluster = FakeCluster::new("v1.19.0", &["apiregistration.k8s.io/v1"]);
    cluster.releases = vec![release];

    let err = check(
        &bundle,
        &cluster,
        &FakeCharts::default(),
        &NoFindings,
        EngineOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CheckError::InvalidSchema { .. }));
}

#[tokio::test]
async fn test_upstream_schema() {
    let mut release = metrics_server_release();
    release.values = object(json!({ "replicas": "two" }));
    let mut cluster = FakeCluster::new("v1.19.0", &["apiregistration.k8s.io/v1"]);
    cluster.releases = vec![release];

    let mut charts = FakeCharts::default();
    charts.archives.insert(
        "https://charts.example.com/metrics-server-5.10.14.tgz".to_string(),
        chart_archive(&[
            ("metrics-server/Chart.yaml", "name: metrics-server\n"),
            ("metrics-server/values.schema.json", REPLICAS_SCHEMA),
        ]),
    );

    let report = check(
        &metrics_server_bundle(),
        &cluster,
        &charts,
        &NoFindings,
        EngineOptions::default(),
    )
    .await
    .unwrap();

    let addon = &report.addons[0];
    assert_eq!(addon.action_items.len(), 1);
    assert_eq!(addon.action_items[0].title, "Failed Schema Validation");
    assert!(addon.warnings.is_empty());
}

#[tokio::test]
async fn test_missing_upstream_schema_is_a_warning() {
    let mut release = metrics_server_release();
    release.values = object(json!({ "replicas": 2 }));
    let mut cluster = FakeCluster::new("v1.19.0", &["apiregistration.k8s.io/v1"]);
    cluster.releases = vec![release];

    let report = check(
        &metrics_server_bundle(),
        &cluster,
        &FakeCharts::default(),
        &NoFindings,
        EngineOptions::default(),
    )
    .await
    .unwrap();

    let addon = &report.addons[0];
    assert!(addon.action_items.is_empty());
    assert_eq!(
        addon.warnings,
        vec!["no schema available, unable to validate release"]
    );
}

#[tokio::test]
async fn test_policies_cover_manifest_and_cluster_objects() {
    let mut bundle = metrics_server_bundle();
    bundle.addons[0].opa_checks = vec![LIMITS_POLICY.to_string()];
    bundle.addons[0].resources = vec!["apps/v1/deployments".to_string(), "not-a-selector".to_string()];

    let mut release = metrics_server_release();
    release.manifest = serde_yaml::to_string(&deployment("metrics-server", "kube-system", false)).unwrap();

    let mut cluster = FakeCluster::new("v1.19.0", &["apiregistration.k8s.io/v1"]);
    cluster.releases = vec![release];
    cluster.namespaces = vec!["default".to_string(), "kube-system".to_string()];
    cluster.objects.insert(
        ("deployments".to_string(), "default".to_string()),
        vec![deployment("web", "default", false), deployment("api", "default", true)],
    );

    let report = check(
        &bundle,
        &cluster,
        &FakeCharts::default(),
        &RegoEvaluator::new(),
        EngineOptions::default(),
    )
    .await
    .unwrap();

    let addon = &report.addons[0];
    let flagged: Vec<(&str, &str, &str)> = addon
        .action_items
        .iter()
        .map(|item| {
            (
                item.resource_namespace.as_str(),
                item.resource_kind.as_str(),
                item.resource_name.as_str(),
            )
        })
        .collect();
    assert_eq!(
        flagged,
        vec![
            ("kube-system", "Deployment", "metrics-server"),
            ("default", "Deployment", "web"),
        ]
    );
    assert_eq!(addon.action_items[0].title, "Container without resource limits");
    assert_eq!(addon.action_items[0].category, "Reliability");

    assert_eq!(addon.warnings.len(), 1);
    assert!(addon.warnings[0].contains("not-a-selector"));

    let listed = cluster.listed.lock().unwrap().clone();
    assert_eq!(
        listed,
        vec!["apps/v1/deployments@default", "apps/v1/deployments@kube-system"]
    );
}

#[tokio::test]
async fn test_namespace_option_limits_object_lookups() {
    let mut bundle = metrics_server_bundle();
    bundle.addons[0].opa_checks = vec![LIMITS_POLICY.to_string()];
    bundle.addons[0].resources = vec!["apps/v1/deployments".to_string()];

    let mut other = metrics_server_release();
    other.namespace = "monitoring".to_string();

    let mut cluster = FakeCluster::new("v1.19.0", &["apiregistration.k8s.io/v1"]);
    cluster.releases = vec![metrics_server_release(), other];
    cluster.namespaces = vec!["default".to_string(), "kube-system".to_string()];

    let report = check(
        &bundle,
        &cluster,
        &FakeCharts::default(),
        &RegoEvaluator::new(),
        EngineOptions {
            namespace: Some("kube-system".to_string()),
            concurrency: 1,
        },
    )
    .await
    .unwrap();

    assert_eq!(report.addons.len(), 1);
    assert_eq!(
        cluster.listed.lock().unwrap().clone(),
        vec!["apps/v1/deployments@kube-system"]
    );
}

#[tokio::test]
async fn test_concurrency_keeps_report_order() {
    let namespaces = ["team-d", "team-a", "team-c", "team-b", "team-e"];
    let mut cluster = FakeCluster::new("v1.21.0", &["apiregistration.k8s.io/v1"]);
    cluster.releases = namespaces
        .iter()
        .map(|ns| ReleaseRecord {
            namespace: ns.to_string(),
            ..metrics_server_release()
        })
        .collect();

    let report = check(
        &metrics_server_bundle(),
        &cluster,
        &FakeCharts::default(),
        &NoFindings,
        EngineOptions {
            namespace: None,
            concurrency: 4,
        },
    )
    .await
    .unwrap();

    let order: Vec<&str> = report
        .addons
        .iter()
        .map(|a| a.action_items[0].resource_namespace.as_str())
        .collect();
    assert_eq!(order, vec!["team-a", "team-b", "team-c", "team-d", "team-e"]);
    assert_eq!(report.action_item_count(), 5);
}

#[tokio::test]
async fn test_no_matches_gives_empty_report() {
    let mut cluster = FakeCluster::new("v1.21.0", &[]);
    cluster.releases = vec![ReleaseRecord {
        chart_name: "traefik".to_string(),
        ..metrics_server_release()
    }];

    let report = check(
        &metrics_server_bundle(),
        &cluster,
        &FakeCharts::default(),
        &NoFindings,
        EngineOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(report, Report::default());
}

struct BrokenInventory;

#[async_trait]
impl ReleaseSource for BrokenInventory {
    async fn list_deployed_releases(&self, _namespace: Option<&str>) -> Result<Vec<ReleaseRecord>> {
        anyhow::bail!("failed to decode release sh.helm.release.v1.metrics-server.v3")
    }
}

#[tokio::test]
async fn test_inventory_failure_is_fatal() {
    let err = load_inventory(&BrokenInventory, None).await.unwrap_err();
    assert!(matches!(err, CheckError::Inventory(_)));
}

#[tokio::test]
async fn test_only_missing_api_versions_are_reported() {
    let bundle = BundleSpec {
        addons: vec![Addon {
            necessary_api_versions: vec!["apps/v1".to_string(), "v1".to_string()],
            ..metrics_server_bundle().addons.remove(0)
        }],
    };
    let mut cluster = FakeCluster::new("v1.19.0", &["v1"]);
    cluster.releases = vec![metrics_server_release()];

    let report = check(
        &bundle,
        &cluster,
        &FakeCharts::default(),
        &NoFindings,
        EngineOptions::default(),
    )
    .await
    .unwrap();

    let items = &report.addons[0].action_items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "API version apps/v1 is not available");
    assert_eq!(items[0].description, "The Kubernetes cluster does not serve the API apps/v1");
}
