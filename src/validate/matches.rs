//! Correlating bundle addons with deployed releases

use crate::bundle::{Addon, BundleSpec};
use crate::release::ReleaseRecord;
use crate::report::AddonOutput;
use crate::version::{parse_strict, parse_tolerant};
use std::collections::BTreeMap;

/// An addon paired with the release it applies to
#[derive(Debug, Clone)]
pub struct Match<'a> {
    pub addon: &'a Addon,
    pub release: &'a ReleaseRecord,
    pub output: AddonOutput,
}

impl<'a> Match<'a> {
    fn new(addon: &'a Addon, release: &'a ReleaseRecord) -> Self {
        let mut output = AddonOutput::new(&release.name, &release.chart_version, &addon.versions.end);
        output.notes = addon.notes.clone();
        output.warnings = addon.warnings.clone();
        Self {
            addon,
            release,
            output,
        }
    }

    /// `namespace/name` of the matched release
    pub fn key(&self) -> String {
        self.release.key()
    }
}

/// Pair every release with the first addon whose chart and version range cover it
///
/// A release matches when the chart names are equal and
/// `start <= version < end`. Pairs whose versions do not parse are
/// skipped. Results are keyed and ordered by `namespace/name`.
pub fn match_releases<'a>(
    bundle: &'a BundleSpec,
    releases: &'a [ReleaseRecord],
) -> BTreeMap<String, Match<'a>> {
    let mut matches: BTreeMap<String, Match<'a>> = BTreeMap::new();

    for release in releases {
        for addon in &bundle.addons {
            if addon.source.chart != release.chart_name {
                continue;
            }
            if !in_range(addon, release) {
                continue;
            }

            let key = release.key();
            if let Some(existing) = matches.get(&key) {
                tracing::warn!(
                    "Release {} also matches addon {}; keeping addon {}",
                    key,
                    addon.name,
                    existing.addon.name
                );
                continue;
            }

            tracing::debug!(
                "Matched release {} ({}) to addon {}",
                key,
                release.chart_version,
                addon.name
            );
            matches.insert(key, Match::new(addon, release));
        }
    }

    tracing::info!("Matched {} releases to bundle addons", matches.len());
    matches
}

/// Whether the release's chart version falls within the addon's `[start, end)` range
pub fn in_range(addon: &Addon, release: &ReleaseRecord) -> bool {
    let current = match parse_tolerant(&release.chart_version) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(
                "Skipping release {}: chart version '{}' is not semver: {}",
                release.key(),
                release.chart_version,
                e
            );
            return false;
        }
    };
    let start = match parse_strict(&addon.versions.start) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(
                "Skipping addon {}: start version '{}' is not semver: {}",
                addon.name,
                addon.versions.start,
                e
            );
            return false;
        }
    };
    let end = match parse_strict(&addon.versions.end) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(
                "Skipping addon {}: end version '{}' is not semver: {}",
                addon.name,
                addon.versions.end,
                e
            );
            return false;
        }
    };

    start <= current && current < end
}
