//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via XMLRPC_CONFIG)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use xmlrpc_protocol::DEFAULT_PORT;

/// Paths served by the endpoint itself.
const RESERVED_PATHS: &[&str] = &["/metrics", "/health"];

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// RPC endpoint configuration.
    pub rpc: RpcConfig,
    /// Method overview page configuration.
    pub overview: OverviewConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("XMLRPC_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides read through `var`, keyed by environment variable name.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        self.network.apply_overrides(&var);
        self.rpc.apply_overrides(&var);
        self.overview.apply_overrides(&var);
        self.metrics.apply_overrides(&var);
    }

    /// Checks values that cannot be expressed in the types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rpc.path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "rpc.path must start with '/': {}",
                self.rpc.path
            )));
        }
        if RESERVED_PATHS.contains(&self.rpc.path.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "rpc.path {} is reserved",
                self.rpc.path
            )));
        }
        if self.rpc.max_body_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "rpc.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
        }
    }
}

impl NetworkConfig {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(addr) = var("XMLRPC_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }
    }
}

/// RPC endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Request path of the endpoint.
    pub path: String,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            path: "/RPC2".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl RpcConfig {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("XMLRPC_PATH") {
            self.path = path;
        }

        if let Some(max) = var("XMLRPC_MAX_BODY_BYTES") {
            if let Ok(n) = max.parse() {
                self.max_body_bytes = n;
            }
        }
    }
}

/// Method overview page configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverviewConfig {
    /// Serve the overview page on GET requests to the endpoint.
    pub enabled: bool,
    /// Title shown on the page. Empty uses the registered service names.
    pub title: String,
}

impl Default for OverviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: String::new(),
        }
    }
}

impl OverviewConfig {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(enabled) = var("XMLRPC_OVERVIEW_ENABLED") {
            self.enabled = parse_flag(&enabled);
        }
        if let Some(title) = var("XMLRPC_OVERVIEW_TITLE") {
            self.title = title;
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics at `/metrics`.
    pub enabled: bool,
}

impl MetricsConfig {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(enabled) = var("XMLRPC_METRICS_ENABLED") {
            self.enabled = parse_flag(&enabled);
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde helpers for SocketAddr as a string in YAML.
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.rpc.path, "/RPC2");
        assert_eq!(config.rpc.max_body_bytes, 1024 * 1024);
        assert!(config.overview.enabled);
        assert!(!config.metrics.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.network.bind_addr, config.network.bind_addr);
        assert_eq!(parsed.rpc.path, config.rpc.path);
    }

    #[test]
    fn test_from_file_partial() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("xmlrpcd.yaml");
        std::fs::write(
            &path,
            "network:\n  bind_addr: \"0.0.0.0:9000\"\noverview:\n  title: Blog API\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.network.bind_addr.port(), 9000);
        assert_eq!(config.overview.title, "Blog API");
        // Unspecified sections keep their defaults
        assert!(config.overview.enabled);
        assert_eq!(config.rpc.path, "/RPC2");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saved.yaml");
        let mut config = Config::default();
        config.rpc.path = "/xmlrpc".to_string();
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.rpc.path, "/xmlrpc");
    }

    #[test]
    fn test_from_file_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            Config::from_file(&missing),
            Err(ConfigError::IoError(..))
        ));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "network:\n  bind_addr: not-an-address\n").unwrap();
        let err = Config::from_file(&bad).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("XMLRPC_BIND", "127.0.0.1:9100"),
            ("XMLRPC_PATH", "/api"),
            ("XMLRPC_MAX_BODY_BYTES", "4096"),
            ("XMLRPC_OVERVIEW_ENABLED", "false"),
            ("XMLRPC_OVERVIEW_TITLE", "Blog"),
            ("XMLRPC_METRICS_ENABLED", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.network.bind_addr.port(), 9100);
        assert_eq!(config.rpc.path, "/api");
        assert_eq!(config.rpc.max_body_bytes, 4096);
        assert!(!config.overview.enabled);
        assert_eq!(config.overview.title, "Blog");
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_invalid_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            "XMLRPC_BIND" => Some("nowhere".to_string()),
            "XMLRPC_MAX_BODY_BYTES" => Some("lots".to_string()),
            _ => None,
        });
        assert_eq!(config.network.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.rpc.max_body_bytes, 1024 * 1024);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.rpc.path = "RPC2".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        config.rpc.path = "/metrics".to_string();
        assert!(config.validate().is_err());

        config.rpc.path = "/RPC2".to_string();
        config.rpc.max_body_bytes = 0;
        assert!(config.validate().is_err());
    }
}
