// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Daemon HTTP server implementation

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use local_volume_core::{
    application::volume_service::VolumeService,
    domain::node_config::NodeConfigManifest,
    infrastructure::{HostPathDriver, KubernetesControlPlane},
    presentation::api::app,
};

/// Command-line overrides for the listen address.
#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
}

pub async fn start_daemon(config: NodeConfigManifest, options: ServeOptions) -> Result<()> {
    config
        .validate()
        .context("Configuration validation failed")?;

    let node_name = config.spec.node.name.clone();
    info!(
        node = %node_name,
        "Local volume daemon starting (PID: {})",
        std::process::id()
    );

    let driver = Arc::new(HostPathDriver::new(&config.spec.driver));
    let control_plane = Arc::new(
        KubernetesControlPlane::from_config(&config.spec.control_plane)
            .context("Failed to initialize control plane client")?,
    );
    let volume_service = Arc::new(VolumeService::new(driver, control_plane, node_name));

    let host = options
        .host
        .unwrap_or_else(|| config.spec.server.bind_address.clone());
    let port = options.port.unwrap_or(config.spec.server.port);
    let addr = format!("{}:{}", host, port);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Daemon listening on {}", addr);

    axum::serve(listener, app(volume_service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Daemon shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
