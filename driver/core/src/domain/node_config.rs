// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Node Configuration Types
//
// Defines the configuration schema for the local volume daemon, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Node identity (the name recorded in PV node affinity)
// - Protocol server bind settings
// - Control-plane (Kubernetes API server) connection settings
// - Host-path driver settings
// - Logging settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "local-volume/v1";
pub const KIND: &str = "NodeConfig";

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "LOCAL_VOLUME_CONFIG_PATH";

/// Environment variable set through the downward API with the node name.
pub const NODE_NAME_ENV: &str = "NODE_NAME";

/// Top-level Kubernetes-style node configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfigManifest {
    /// API version (must be "local-volume/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "NodeConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: NodeConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Node configuration specification (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfigSpec {
    /// Identity of the host this daemon runs on
    #[serde(default)]
    pub node: NodeIdentity,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub control_plane: ControlPlaneConfig,

    #[serde(default)]
    pub driver: DriverConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

/// Node identity, fixed at startup and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Node name as registered with the cluster (the value written into
    /// PV node affinity)
    #[serde(default = "default_node_name")]
    pub name: String,
}

impl Default for NodeIdentity {
    fn default() -> Self {
        Self {
            name: default_node_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Network bind address (e.g. "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP protocol port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    /// API server URL. When unset the in-cluster address is derived from
    /// KUBERNETES_SERVICE_HOST / KUBERNETES_SERVICE_PORT.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_server: Option<String>,

    /// Bearer token file (service account token)
    #[serde(default = "default_token_path")]
    pub token_path: String,

    /// CA bundle used to verify the API server
    #[serde(default = "default_ca_path")]
    pub ca_path: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Node label matched by the affinity term
    #[serde(default = "default_node_label_key")]
    pub node_label_key: String,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            api_server: None,
            token_path: default_token_path(),
            ca_path: default_ca_path(),
            timeout_seconds: default_timeout_seconds(),
            node_label_key: default_node_label_key(),
        }
    }
}

impl ControlPlaneConfig {
    /// Resolve the API server URL, falling back to the in-cluster service env.
    pub fn resolve_api_server(&self) -> Option<String> {
        if let Some(url) = &self.api_server {
            return Some(url.trim_end_matches('/').to_string());
        }
        let host = std::env::var("KUBERNETES_SERVICE_HOST").ok()?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
        if host.contains(':') {
            Some(format!("https://[{}]:{}", host, port))
        } else {
            Some(format!("https://{}:{}", host, port))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Directory holding one backing directory per volume
    #[serde(default = "default_volumes_dir")]
    pub volumes_dir: String,

    #[serde(default = "default_mount_binary")]
    pub mount_binary: String,

    #[serde(default = "default_umount_binary")]
    pub umount_binary: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            volumes_dir: default_volumes_dir(),
            mount_binary: default_mount_binary(),
            umount_binary: default_umount_binary(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_node_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8099
}

fn default_token_path() -> String {
    "/var/run/secrets/kubernetes.io/serviceaccount/token".to_string()
}

fn default_ca_path() -> String {
    "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_node_label_key() -> String {
    "kubernetes.io/hostname".to_string()
}

fn default_volumes_dir() -> String {
    "/mnt/local-volumes".to_string()
}

fn default_mount_binary() -> String {
    "mount".to_string()
}

fn default_umount_binary() -> String {
    "umount".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for NodeConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "local-volume".to_string(),
                labels: None,
            },
            spec: NodeConfigSpec::default(),
        }
    }
}

impl NodeConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Serialize configuration to YAML
    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. LOCAL_VOLUME_CONFIG_PATH environment variable
    /// 2. ./local-volume.yaml (working directory)
    /// 3. ~/.local-volume/config.yaml (user home)
    /// 4. /etc/local-volume/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./local-volume.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".local-volume").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/local-volume/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    /// This allows DaemonSet deployments to inject the node name via the
    /// downward API without templating the config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(name) = std::env::var(NODE_NAME_ENV) {
            if name.trim().is_empty() {
                tracing::warn!("Ignoring empty {} override", NODE_NAME_ENV);
            } else {
                tracing::info!("Environment override: {}={}", NODE_NAME_ENV, name);
                self.spec.node.name = name;
            }
        }

        if let Ok(dir) = std::env::var("LOCAL_VOLUME_VOLUMES_DIR") {
            tracing::info!("Environment override: LOCAL_VOLUME_VOLUMES_DIR={}", dir);
            self.spec.driver.volumes_dir = dir;
        }
    }

    /// Logging settings, with defaults when the section is absent
    pub fn logging(&self) -> LoggingConfig {
        self.spec
            .observability
            .as_ref()
            .and_then(|o| o.logging.clone())
            .unwrap_or_else(|| LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            })
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.node.name.trim().is_empty() {
            anyhow::bail!("spec.node.name cannot be empty");
        }

        if self.spec.server.port == 0 {
            anyhow::bail!("spec.server.port must be non-zero");
        }

        if self.spec.driver.volumes_dir.is_empty() {
            anyhow::bail!("spec.driver.volumes_dir cannot be empty");
        }

        if let Some(url) = &self.spec.control_plane.api_server {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!(
                    "spec.control_plane.api_server must be an http(s) URL, got '{}'",
                    url
                );
            }
        }

        let format = self.logging().format;
        if format != "text" && format != "json" {
            anyhow::bail!("Unsupported log format '{}'. Use 'text' or 'json'", format);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = NodeConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert!(!manifest.spec.node.name.is_empty());
        assert_eq!(manifest.spec.server.port, 8099);
        assert_eq!(manifest.spec.control_plane.node_label_key, "kubernetes.io/hostname");
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let yaml = r#"
apiVersion: local-volume/v1
kind: NodeConfig
metadata:
  name: worker-pool-a
spec:
  node:
    name: worker-3
  control_plane:
    api_server: https://10.0.0.1:6443/
"#;
        let manifest = NodeConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.spec.node.name, "worker-3");
        assert_eq!(manifest.spec.server.bind_address, "127.0.0.1");
        assert_eq!(manifest.spec.driver.volumes_dir, "/mnt/local-volumes");
        assert_eq!(manifest.spec.control_plane.timeout_seconds, 30);
        assert_eq!(
            manifest.spec.control_plane.resolve_api_server().as_deref(),
            Some("https://10.0.0.1:6443")
        );
        assert_eq!(manifest.logging().format, "text");
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut manifest = NodeConfigManifest::default();
        manifest.spec.node.name = "node-a".to_string();
        manifest.spec.observability = Some(ObservabilityConfig {
            logging: Some(LoggingConfig {
                level: "debug".to_string(),
                format: "json".to_string(),
            }),
        });
        std::fs::write(&path, manifest.to_yaml_string().unwrap()).unwrap();

        let parsed = NodeConfigManifest::from_yaml_file(&path).unwrap();
        assert_eq!(parsed.spec.node.name, "node-a");
        assert_eq!(parsed.logging().level, "debug");
        assert_eq!(parsed.logging().format, "json");
    }

    #[test]
    fn test_explicit_missing_path_fails() {
        let result =
            NodeConfigManifest::load_or_default(Some(PathBuf::from("/nonexistent/local-volume.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_validation() {
        let mut manifest = NodeConfigManifest::default();
        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "WrongKind".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.node.name = "  ".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.node.name = "node-a".to_string();

        manifest.spec.server.port = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.server.port = 8099;

        manifest.spec.control_plane.api_server = Some("10.0.0.1:6443".to_string());
        assert!(manifest.validate().is_err());
        manifest.spec.control_plane.api_server = Some("https://10.0.0.1:6443".to_string());
        assert!(manifest.validate().is_ok());

        manifest.spec.observability = Some(ObservabilityConfig {
            logging: Some(LoggingConfig {
                level: "info".to_string(),
                format: "xml".to_string(),
            }),
        });
        assert!(manifest.validate().is_err());
    }
}
