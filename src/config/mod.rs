//! Configuration System
//!
//! Loads configuration from YAML files with a cascading priority system:
//! 1. `./pathctl.yaml` (current directory - highest priority)
//! 2. `~/.pathctl.yaml` (home directory)
//! 3. `~/.config/pathctl/pathctl.yaml` (user config directory)
//! 4. `/etc/pathctl/pathctl.yaml` (system - lowest priority)
//!
//! Values from higher priority files override those from lower priority files.
//!
//! # YAML Structure
//!
//! ```yaml
//! node:
//!   name: relay-1
//!   tick_interval_ms: 1000
//!   latency:
//!     probe_interval_ms: 5000
//!     probe_timeout_ms: 10000
//!     max_outstanding: 8
//!     max_resends: 3
//!     echo_latency_ms: 1
//!   buffers:
//!     inbound_channel: 1024
//!     outbound_channel: 1024
//! ```

mod node;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub use node::{BuffersConfig, LatencyConfig, NodeConfig};

/// Default config filename.
const CONFIG_FILENAME: &str = "pathctl.yaml";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid config value {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Node configuration (`node.*`).
    #[serde(default)]
    pub node: NodeConfig,
}

impl Config {
    /// Create a new configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the standard search paths.
    ///
    /// Returns a tuple of (config, paths_loaded) where paths_loaded contains
    /// the paths that were successfully loaded.
    pub fn load() -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let search_paths = Self::search_paths();
        Self::load_from_paths(&search_paths)
    }

    /// Load configuration from specific paths.
    ///
    /// Paths are processed in order, with later paths overriding earlier ones.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let mut config = Config::default();
        let mut loaded_paths = Vec::new();

        for path in paths {
            if path.exists() {
                let file_config = Self::load_file(path)?;
                config.merge(file_config);
                loaded_paths.push(path.clone());
            }
        }

        Ok((config, loaded_paths))
    }

    /// Load configuration from a single file.
    ///
    /// The file is validated on its own, so a bad value is reported against
    /// the file that set it.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the session and channels cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.node.validate()
    }

    /// Get the standard search paths in priority order (lowest to highest).
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        paths.push(PathBuf::from("/etc/pathctl").join(CONFIG_FILENAME));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("pathctl").join(CONFIG_FILENAME));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".pathctl.yaml"));
        }

        paths.push(PathBuf::from(".").join(CONFIG_FILENAME));

        paths
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` when present.
    pub fn merge(&mut self, other: Config) {
        if other.node.name.is_some() {
            self.node.name = other.node.name;
        }
        if other.node.tick_interval_ms.is_some() {
            self.node.tick_interval_ms = other.node.tick_interval_ms;
        }
        self.node.latency.merge(other.node.latency);
        self.node.buffers.merge(other.node.buffers);
    }

    /// Name to show in logs.
    pub fn node_name(&self) -> &str {
        self.node.name.as_deref().unwrap_or("unnamed")
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.node.tick_interval_ms())
    }

    /// Serialize this configuration to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config() {
        let config = Config::new();
        assert!(config.node.name.is_none());
        assert_eq!(config.node_name(), "unnamed");
        assert_eq!(config.node.latency, LatencyConfig::default());
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_yaml_empty() {
        let config: Config = serde_yaml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_yaml_partial() {
        let yaml = r#"
node:
  name: relay-1
  latency:
    probe_timeout_ms: 2500
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.node_name(), "relay-1");
        assert_eq!(config.node.latency.probe_timeout_ms(), 2500);
        assert_eq!(config.node.latency.probe_interval_ms(), 5_000);
        assert_eq!(config.node.buffers.outbound_channel(), 1024);
    }

    #[test]
    fn test_parse_yaml_full() {
        let yaml = r#"
node:
  tick_interval_ms: 250
  latency:
    probe_interval_ms: 100
    probe_timeout_ms: 300
    max_outstanding: 2
    max_resends: 0
    echo_latency_ms: 5
  buffers:
    inbound_channel: 16
    outbound_channel: 32
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
        assert_eq!(
            config.node.latency,
            LatencyConfig {
                probe_interval_ms: Some(100),
                probe_timeout_ms: Some(300),
                max_outstanding: Some(2),
                max_resends: Some(0),
                echo_latency_ms: Some(5),
            }
        );
        assert_eq!(config.node.buffers.inbound_channel(), 16);
        assert_eq!(config.node.buffers.outbound_channel(), 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml_wrong_type() {
        let yaml = r#"
node:
  latency:
    max_outstanding: lots
"#;
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_merge_configs() {
        let mut base = Config::new();
        base.node.name = Some("base".to_string());
        base.node.latency.probe_timeout_ms = Some(2_000);

        let mut override_config = Config::new();
        override_config.node.name = Some("override".to_string());
        override_config.node.latency.max_resends = Some(1);

        base.merge(override_config);
        assert_eq!(base.node_name(), "override");
        assert_eq!(base.node.latency.probe_timeout_ms(), 2_000);
        assert_eq!(base.node.latency.max_resends(), 1);
    }

    #[test]
    fn test_merge_can_restore_default_value() {
        let mut base = Config::new();
        base.node.tick_interval_ms = Some(250);
        base.node.latency.max_resends = Some(5);
        base.node.buffers.outbound_channel = Some(16);

        let mut override_config = Config::new();
        override_config.node.tick_interval_ms = Some(1_000);
        override_config.node.latency.max_resends = Some(3);
        override_config.node.buffers.outbound_channel = Some(1024);

        base.merge(override_config);
        assert_eq!(base.tick_interval(), Duration::from_secs(1));
        assert_eq!(base.node.latency.max_resends(), 3);
        assert_eq!(base.node.buffers.outbound_channel(), 1024);
    }

    #[test]
    fn test_merge_preserves_base_when_override_empty() {
        let mut base = Config::new();
        base.node.name = Some("base".to_string());
        base.node.buffers.inbound_channel = Some(8);

        base.merge(Config::new());
        assert_eq!(base.node_name(), "base");
        assert_eq!(base.node.buffers.inbound_channel(), 8);
    }

    #[test]
    fn test_load_from_paths_priority() {
        let dir = TempDir::new().unwrap();
        let low = dir.path().join("low.yaml");
        let high = dir.path().join("high.yaml");
        let missing = dir.path().join("missing.yaml");

        fs::write(&low, "node:\n  name: low\n  latency:\n    max_outstanding: 4\n").unwrap();
        fs::write(&high, "node:\n  name: high\n").unwrap();

        let (config, loaded) =
            Config::load_from_paths(&[low.clone(), missing, high.clone()]).unwrap();
        assert_eq!(loaded, vec![low, high]);
        assert_eq!(config.node_name(), "high");
        assert_eq!(config.node.latency.max_outstanding(), 4);
    }

    #[test]
    fn test_load_from_paths_higher_file_sets_default() {
        let dir = TempDir::new().unwrap();
        let system = dir.path().join("system.yaml");
        let local = dir.path().join("local.yaml");

        fs::write(&system, "node:\n  latency:\n    max_resends: 5\n").unwrap();
        fs::write(&local, "node:\n  latency:\n    max_resends: 3\n").unwrap();

        let (config, _) = Config::load_from_paths(&[system, local]).unwrap();
        assert_eq!(config.node.latency.max_resends(), 3);
    }

    #[test]
    fn test_zero_values_rejected() {
        let dir = TempDir::new().unwrap();
        for (name, yaml, field) in [
            ("tick.yaml", "node:\n  tick_interval_ms: 0\n", "node.tick_interval_ms"),
            (
                "inbound.yaml",
                "node:\n  buffers:\n    inbound_channel: 0\n",
                "node.buffers.inbound_channel",
            ),
            (
                "outbound.yaml",
                "node:\n  buffers:\n    outbound_channel: 0\n",
                "node.buffers.outbound_channel",
            ),
            (
                "timeout.yaml",
                "node:\n  latency:\n    probe_timeout_ms: 0\n",
                "node.latency.probe_timeout_ms",
            ),
            (
                "outstanding.yaml",
                "node:\n  latency:\n    max_outstanding: 0\n",
                "node.latency.max_outstanding",
            ),
        ] {
            let path = dir.path().join(name);
            fs::write(&path, yaml).unwrap();

            match Config::load_file(&path) {
                Err(ConfigError::Invalid { field: got, .. }) => assert_eq!(got, field),
                other => panic!("expected Invalid for {field}, got {other:?}"),
            }
            assert!(Config::load_from_paths(&[path]).is_err());
        }
    }

    #[test]
    fn test_load_file_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "node: [unclosed").unwrap();

        let err = Config::load_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseYaml { .. }));
    }

    #[test]
    fn test_load_file_missing() {
        let err = Config::load_file(Path::new("/nonexistent/pathctl.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = Config::new();
        config.node.name = Some("relay-2".to_string());
        config.node.latency.echo_latency_ms = Some(9);

        let yaml = config.to_yaml().unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_search_paths_order() {
        let paths = Config::search_paths();
        assert_eq!(paths.first(), Some(&PathBuf::from("/etc/pathctl/pathctl.yaml")));
        assert_eq!(paths.last(), Some(&PathBuf::from("./pathctl.yaml")));
    }
}
