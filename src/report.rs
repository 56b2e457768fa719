//! Check report
//!
//! `AddonOutput` is created by the matcher, filled in by each validation
//! step and folded into a `Report` once every match has been validated.

use crate::error::CheckResult;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// A single finding attached to an addon
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionItem {
    pub resource_namespace: String,
    pub resource_kind: String,
    pub resource_name: String,
    pub title: String,
    pub description: String,
    pub remediation: String,
    pub severity: f64,
    pub category: String,
}

/// Current and target chart versions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputVersions {
    pub current: String,
    pub upgrade: String,
}

/// Findings for one matched release
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonOutput {
    pub name: String,
    pub versions: OutputVersions,
    pub upgrade_confidence: i32,
    pub action_items: Vec<ActionItem>,
    pub notes: String,
    pub warnings: Vec<String>,
}

impl AddonOutput {
    pub fn new(name: impl Into<String>, current: impl Into<String>, upgrade: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: OutputVersions {
                current: current.into(),
                upgrade: upgrade.into(),
            },
            ..Default::default()
        }
    }

    /// Merge warnings from an external source, skipping ones already present
    pub fn merge_warnings<I>(&mut self, warnings: I)
    where
        I: IntoIterator<Item = String>,
    {
        for warning in warnings {
            if !self.warnings.contains(&warning) {
                self.warnings.push(warning);
            }
        }
    }
}

/// The final report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub addons: Vec<AddonOutput>,
}

impl Report {
    /// Fold addon outputs into a report, keeping the given order
    pub fn assemble<I>(outputs: I) -> Self
    where
        I: IntoIterator<Item = AddonOutput>,
    {
        Self {
            addons: outputs.into_iter().collect(),
        }
    }

    pub fn action_item_count(&self) -> usize {
        self.addons.iter().map(|a| a.action_items.len()).sum()
    }

    pub fn to_json(&self) -> CheckResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn render(&self, format: OutputFormat) -> CheckResult<String> {
        match format {
            OutputFormat::Json => self.to_json(),
            OutputFormat::Text => Ok(self.to_text()),
        }
    }

    /// Human-readable rendering
    pub fn to_text(&self) -> String {
        if self.addons.is_empty() {
            return "No Helm releases matched the bundle.\n".to_string();
        }

        let mut out = String::new();
        for (i, addon) in self.addons.iter().enumerate() {
            if i > 0 {
                out.push_str("\n---\n\n");
            }
            let _ = writeln!(out, "Addon: {}", addon.name);
            let _ = writeln!(
                out,
                "Versions: {} -> {}",
                addon.versions.current, addon.versions.upgrade
            );
            if !addon.notes.is_empty() {
                let _ = writeln!(out, "Notes: {}", addon.notes);
            }
            if !addon.warnings.is_empty() {
                out.push_str("Warnings:\n");
                for warning in &addon.warnings {
                    let _ = writeln!(out, "  - {}", warning);
                }
            }
            if addon.action_items.is_empty() {
                out.push_str("Action items: none\n");
            } else {
                let _ = writeln!(out, "Action items ({}):", addon.action_items.len());
                for (n, item) in addon.action_items.iter().enumerate() {
                    let _ = writeln!(out, "  {}. {}", n + 1, item.title);
                    let resource = [
                        item.resource_namespace.as_str(),
                        item.resource_kind.as_str(),
                        item.resource_name.as_str(),
                    ]
                    .iter()
                    .filter(|part| !part.is_empty())
                    .copied()
                    .collect::<Vec<_>>()
                    .join("/");
                    if !resource.is_empty() {
                        let _ = writeln!(out, "     resource: {}", resource);
                    }
                    if !item.description.is_empty() {
                        let _ = writeln!(out, "     {}", item.description);
                    }
                    if !item.remediation.is_empty() {
                        let _ = writeln!(out, "     remediation: {}", item.remediation);
                    }
                }
            }
        }
        out
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            other => Err(anyhow::anyhow!("Unknown output format: {}", other)),
        }
    }
}
