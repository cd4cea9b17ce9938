//! Daemon configuration

use anyhow::{Context, Result};
use discovery_registry::RegistryConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub registry: RegistryConfig,
    /// Endpoint paths (`service/version/endpoint`) created under the root at startup
    pub seed: Vec<String>,
    /// Interval between registry state reports
    pub report_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            seed: Vec::new(),
            report_interval_secs: 30,
        }
    }
}

impl DaemonConfig {
    /// Load from the YAML file named by `DISCOVERY_CONFIG`, or from the environment
    pub fn load() -> Result<Self> {
        match std::env::var("DISCOVERY_CONFIG") {
            Ok(path) => Self::from_file(path),
            Err(_) => Self::from_env(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: DaemonConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.registry.validate()?;
        Ok(config)
    }

    fn from_env() -> Result<Self> {
        let mut config = DaemonConfig {
            registry: RegistryConfig::from_env()?,
            ..Default::default()
        };
        if let Ok(seed) = std::env::var("DISCOVERY_SEED") {
            config.seed = seed
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(secs) = std::env::var("DISCOVERY_REPORT_SECS") {
            config.report_interval_secs = secs
                .parse()
                .with_context(|| format!("DISCOVERY_REPORT_SECS is not valid: {:?}", secs))?;
        }
        Ok(config)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "registry:\n  root_path: /prod/discovery\n  tick_interval_secs: 5\nseed:\n  - billing/v1/10.0.0.1:8080\nreport_interval_secs: 60"
        )
        .unwrap();

        let config = DaemonConfig::from_file(file.path()).unwrap();
        assert_eq!(config.registry.root_path, "/prod/discovery");
        assert_eq!(config.registry.tick_interval_secs, 5);
        assert_eq!(config.registry.watch_depth, 2);
        assert_eq!(config.seed, vec!["billing/v1/10.0.0.1:8080"]);
        assert_eq!(config.report_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_from_file_rejects_bad_root() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "registry:\n  root_path: /").unwrap();
        assert!(DaemonConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = DaemonConfig::from_file("/nonexistent/discovery.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
