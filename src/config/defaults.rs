//! Default configuration values

use super::schema::Config;
use crate::chart::DEFAULT_FETCH_TIMEOUT;

/// Get the default configuration
pub fn default_config() -> Config {
    Config::default()
}

pub(super) fn concurrency() -> usize {
    1
}

pub(super) fn timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT.as_secs()
}
