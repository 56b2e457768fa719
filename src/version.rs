//! Semantic version parsing helpers
//!
//! Chart versions reported by Helm and versions reported by the API server
//! are not always strict semver (`v1.19`, `1.21.3-eks-1a2b`, `5.10`). These
//! helpers normalise them before handing off to the `semver` crate.

use semver::{BuildMetadata, Prerelease, Version};

/// Parse a version leniently
///
/// - surrounding whitespace is ignored
/// - a leading `v` or `V` is stripped
/// - missing minor/patch components default to `0`
/// - leading zeros in numeric components are dropped
///
/// Pre-release and build metadata are kept.
pub fn parse_tolerant(input: &str) -> Result<Version, semver::Error> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);

    let mut parts: Vec<String> = core
        .split('.')
        .map(|part| {
            let stripped = part.trim_start_matches('0');
            if stripped.is_empty() && !part.is_empty() {
                "0".to_string()
            } else {
                stripped.to_string()
            }
        })
        .collect();
    while parts.len() < 3 {
        parts.push("0".to_string());
    }

    Version::parse(&format!("{}{}", parts.join("."), suffix))
}

/// Parse a version strictly (bundle version ranges)
pub fn parse_strict(input: &str) -> Result<Version, semver::Error> {
    Version::parse(input)
}

/// Drop pre-release and build metadata, keeping major.minor.patch
pub fn release_core(version: &Version) -> Version {
    let mut core = version.clone();
    core.pre = Prerelease::EMPTY;
    core.build = BuildMetadata::EMPTY;
    core
}
