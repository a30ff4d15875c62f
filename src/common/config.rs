//! Configuration for dcs2node

use crate::common::utils::parse_duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `DCS2NODE__NAME=node1`
pub const ENV_PREFIX: &str = "DCS2NODE";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Node name (unique within the cluster, used as the member and leader name)
    pub name: String,

    /// Cluster scope
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Two-node degraded mode settings
    #[serde(default)]
    pub two_node: TwoNodeConfig,
}

fn default_scope() -> String {
    "postgres".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Two-node degraded mode configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoNodeConfig {
    /// Serve the cluster from the local snapshot when the DCS loses quorum
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Control loop period
    #[serde(default = "default_loop_wait")]
    pub loop_wait: String,

    /// Leader key TTL
    #[serde(default = "default_ttl")]
    pub ttl: String,
}

fn default_enabled() -> bool {
    true
}
fn default_loop_wait() -> String {
    "10s".to_string()
}
fn default_ttl() -> String {
    "30s".to_string()
}

impl Default for TwoNodeConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            loop_wait: default_loop_wait(),
            ttl: default_ttl(),
        }
    }
}

impl TwoNodeConfig {
    pub fn loop_wait(&self) -> crate::Result<Duration> {
        parse_duration(&self.loop_wait)
    }

    pub fn ttl(&self) -> crate::Result<Duration> {
        parse_duration(&self.ttl)
    }
}

impl Config {
    /// Config with defaults for everything but the node name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: default_scope(),
            log_level: default_log_level(),
            two_node: TwoNodeConfig::default(),
        }
    }

    /// Load configuration from an optional TOML file, then `DCS2NODE__*` env vars.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        Self::from_sources(config::Config::builder(), path)
    }

    /// Like [`Config::load`], but `name` may be omitted from every source.
    /// All other errors still propagate.
    pub fn load_or_name(path: Option<&Path>, default_name: &str) -> crate::Result<Self> {
        let builder = config::Config::builder().set_default("name", default_name)?;
        Self::from_sources(builder, path)
    }

    fn from_sources(
        mut builder: config::ConfigBuilder<config::builder::DefaultState>,
        path: Option<&Path>,
    ) -> crate::Result<Self> {
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the coordinator cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::InvalidConfig("name cannot be empty".into()));
        }

        let loop_wait = self.two_node.loop_wait()?;
        let ttl = self.two_node.ttl()?;
        if ttl <= loop_wait {
            return Err(crate::Error::InvalidConfig(format!(
                "ttl ({:?}) must be greater than loop_wait ({:?})",
                ttl, loop_wait
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::new("node1");
        assert_eq!(config.scope, "postgres");
        assert_eq!(config.log_level, "info");
        assert!(config.two_node.enabled);
        assert_eq!(config.two_node.loop_wait().unwrap(), Duration::from_secs(10));
        assert_eq!(config.two_node.ttl().unwrap(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
name = "patroni_server1"
scope = "batman"

[two_node]
enabled = false
loop_wait = "2s"
ttl = "10s"
"#,
        );

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.name, "patroni_server1");
        assert_eq!(config.scope, "batman");
        assert!(!config.two_node.enabled);
        assert_eq!(config.two_node.loop_wait().unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let file = write_config("name = \"node2\"\n");
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.two_node, TwoNodeConfig::default());
    }

    #[test]
    fn test_default_name_fills_missing_name_only() {
        let file = write_config("scope = \"batman\"\n");
        assert!(Config::load(Some(file.path())).is_err());

        let config = Config::load_or_name(Some(file.path()), "node1").unwrap();
        assert_eq!(config.name, "node1");
        assert_eq!(config.scope, "batman");

        let named = write_config("name = \"node2\"\n");
        let config = Config::load_or_name(Some(named.path()), "node1").unwrap();
        assert_eq!(config.name, "node2");
    }

    #[test]
    fn test_default_name_keeps_validation_errors() {
        let file = write_config(
            r#"
name = "node2"

[two_node]
ttl = "1s"
"#,
        );
        let err = Config::load_or_name(Some(file.path()), "node1").unwrap_err();
        assert!(matches!(err, crate::Error::InvalidConfig(ref m) if m.contains("ttl")));
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/dcs2node.toml"))).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::new("  ");
        assert!(config.validate().is_err());

        config.name = "node1".into();
        config.two_node.ttl = "5s".into();
        assert!(config.validate().is_err());

        config.two_node.ttl = "forever".into();
        assert!(config.validate().is_err());
    }
}
