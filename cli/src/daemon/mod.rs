// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Daemon mode implementation
//!
//! Handles:
//! - Serving the driver protocol on the configured address
//! - Forwarding shim verbs to a running daemon
//! - Graceful shutdown

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use local_volume_core::domain::node_config::NodeConfigManifest;

pub mod client;
pub mod server;

pub use client::DaemonClient;
pub use server::{start_daemon, ServeOptions};

/// Base URL for a daemon at `host:port`. `host` may already carry a scheme.
pub fn base_url(host: &str, port: u16) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}:{}", host.trim_end_matches('/'), port)
    } else {
        format!("http://{}:{}", host, port)
    }
}

/// Load the node configuration and apply the `--node-name` flag on top of the
/// file and environment values.
pub fn load_config(
    config_path: Option<PathBuf>,
    node_name: Option<String>,
) -> Result<NodeConfigManifest> {
    let mut config =
        NodeConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;

    if let Some(name) = node_name.filter(|n| !n.trim().is_empty()) {
        info!("Node name override: {}", name);
        config.spec.node.name = name;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("127.0.0.1", 8099), "http://127.0.0.1:8099");
        assert_eq!(base_url("https://node.local/", 443), "https://node.local:443");
    }

    #[test]
    fn test_load_config_applies_node_name_flag() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "apiVersion: local-volume/v1\nkind: NodeConfig\nmetadata:\n  name: test\nspec:\n  node:\n    name: from-file\n"
        )
        .unwrap();

        let config =
            load_config(Some(file.path().to_path_buf()), Some("from-flag".to_string())).unwrap();
        assert_eq!(config.spec.node.name, "from-flag");
    }

    #[test]
    fn test_load_config_ignores_blank_node_name_flag() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "apiVersion: local-volume/v1\nkind: NodeConfig\nmetadata:\n  name: test\nspec:\n  node:\n    name: from-file\n"
        )
        .unwrap();

        let config = load_config(Some(file.path().to_path_buf()), Some("  ".to_string())).unwrap();
        assert_ne!(config.spec.node.name.trim(), "");
    }

    #[test]
    fn test_load_config_missing_explicit_path_fails() {
        let result = load_config(Some(PathBuf::from("/nonexistent/local-volume.yaml")), None);
        assert!(result.is_err());
    }
}
