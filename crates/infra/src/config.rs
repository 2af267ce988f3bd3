//! Dispatcher configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const MAX_CONFLICT_RETRIES_ENV: &str = "TOKENFORGE_MAX_CONFLICT_RETRIES";

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// How many times `dispatch_with_retry` re-runs a command after a
    /// concurrency conflict before giving up.
    pub max_conflict_retries: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
        }
    }
}

impl DispatcherConfig {
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /// Read overrides from `TOKENFORGE_*` environment variables.
    ///
    /// Unset variables keep their defaults; unparseable ones are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(MAX_CONFLICT_RETRIES_ENV) {
            match raw.trim().parse::<u32>() {
                Ok(retries) => config.max_conflict_retries = retries,
                Err(err) => warn!(
                    variable = MAX_CONFLICT_RETRIES_ENV,
                    value = %raw,
                    error = %err,
                    "ignoring invalid configuration value"
                ),
            }
        }

        config
    }
}
