//! Registry configuration

use crate::{RegistryError, Result};
use discovery_core::sanitize;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_TICK_INTERVAL_SECS: u64 = 10;
const DEFAULT_WATCH_DEPTH: usize = 2;

/// Settings for a [`crate::Registry`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Store path holding the service tree
    pub root_path: String,
    /// Interval between reconciliation ticks
    pub tick_interval_secs: u64,
    /// How many levels below the root have their children watched
    pub watch_depth: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root_path: "/discovery".to_string(),
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            watch_depth: DEFAULT_WATCH_DEPTH,
        }
    }
}

impl RegistryConfig {
    pub fn new(root_path: impl Into<String>) -> Self {
        Self {
            root_path: root_path.into(),
            ..Default::default()
        }
    }

    /// Load settings from `DISCOVERY_*` environment variables over the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(root) = std::env::var("DISCOVERY_ROOT") {
            config.root_path = root;
        }
        if let Some(secs) = parse_env("DISCOVERY_TICK_SECS")? {
            config.tick_interval_secs = secs;
        }
        if let Some(depth) = parse_env("DISCOVERY_WATCH_DEPTH")? {
            config.watch_depth = depth;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if sanitize(&self.root_path).is_empty() {
            return Err(RegistryError::InvalidConfiguration(
                "root path must name at least one node".to_string(),
            ));
        }
        if self.tick_interval_secs == 0 {
            return Err(RegistryError::InvalidConfiguration(
                "tick interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) => value.parse().map(Some).map_err(|_| {
            RegistryError::InvalidConfiguration(format!("{} is not valid: {:?}", key, value))
        }),
        Err(_) => Ok(None),
    }
}
