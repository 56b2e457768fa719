//! Addon preflight library
//!
//! Matches the Helm releases deployed in a cluster against addon bundles,
//! validates every match (values schema, policy checks, cluster and API
//! version compatibility) and assembles a report of action items.
//! The binary wires these pieces to a live cluster; tests drive them
//! through in-memory implementations of the traits in [`cluster`],
//! [`chart`] and [`policy`].

pub mod bundle;
pub mod chart;
pub mod cluster;
pub mod config;
pub mod error;
pub mod generate;
pub mod kube;
pub mod policy;
pub mod release;
pub mod report;
pub mod validate;
pub mod version;
pub mod webhook;

pub use bundle::{Addon, BundleLoader, BundleSpec};
pub use error::{CheckError, CheckResult};
pub use release::ReleaseRecord;
pub use report::{ActionItem, AddonOutput, Report};
pub use validate::{EngineOptions, ValidationEngine, match_releases};
