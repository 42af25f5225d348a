// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Control Plane Client Trait
//!
//! Isolates the daemon from the cluster API. The only operation the daemon
//! needs is recording which node holds a volume's data, so the scheduler keeps
//! pods that use the volume on that node.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Port for persistent volume node-affinity updates

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::path_resolver::VolumeId;

/// Cluster control-plane client.
///
/// `update_affinity` must be idempotent: repeated calls with the same
/// arguments converge to the same stored affinity. Any compare-and-update
/// needed to get there is the implementation's concern.
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    /// Restrict `volume` to `node` in the persistent volume metadata store.
    async fn update_affinity(&self, volume: &VolumeId, node: &str)
        -> Result<(), ControlPlaneError>;
}

/// Control-plane errors
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("Persistent volume not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("API server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid client configuration: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for ControlPlaneError {
    fn from(err: reqwest::Error) -> Self {
        ControlPlaneError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ControlPlaneError {
    fn from(err: serde_json::Error) -> Self {
        ControlPlaneError::Serialization(err.to_string())
    }
}
