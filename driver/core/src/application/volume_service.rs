// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Volume Lifecycle Service
//!
//! Sequences the collaborator calls behind each driver verb. The one ordering
//! rule: on `mount`, the node-affinity update for the volume has completed
//! (successfully or not) before the driver mount starts.
//!
//! An affinity failure does not gate the mount. The workload is already
//! scheduled; the error is logged and returned alongside the driver result so
//! the presentation layer can surface it out of band.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Coordinates path resolution, control plane and driver

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::control_plane::ControlPlaneClient;
use crate::domain::driver::Driver;
use crate::domain::path_resolver::{resolve_volume_id, VolumeId};
use crate::domain::protocol::{DriverResponse, MountRequest, UnmountRequest};

/// What happened to the node-affinity update during a mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffinityOutcome {
    Updated(VolumeId),
    /// The target dir did not name a volume; no update was attempted.
    Skipped,
    Failed { volume: VolumeId, error: String },
}

impl AffinityOutcome {
    pub fn error(&self) -> Option<&str> {
        match self {
            AffinityOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MountOutcome {
    /// Driver result, returned to the caller unchanged.
    pub response: DriverResponse,
    pub affinity: AffinityOutcome,
}

pub struct VolumeService {
    driver: Arc<dyn Driver>,
    control_plane: Arc<dyn ControlPlaneClient>,
    node_name: String,
}

impl VolumeService {
    /// `node_name` is this host's identity, recorded in every affinity update.
    pub fn new(
        driver: Arc<dyn Driver>,
        control_plane: Arc<dyn ControlPlaneClient>,
        node_name: impl Into<String>,
    ) -> Self {
        Self {
            driver,
            control_plane,
            node_name: node_name.into(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub async fn init(&self) -> DriverResponse {
        info!("Init request");
        let response = self.driver.init().await;
        info!(status = ?response.status, message = %response.message, "Driver init finished");
        response
    }

    pub async fn mount(&self, request: MountRequest) -> MountOutcome {
        info!(target_dir = %request.target_dir, "Mount request");

        let affinity = self.update_affinity(&request.target_dir).await;

        info!(target_dir = %request.target_dir, "Mounting volume to the host");
        let response = self.driver.mount(request).await;
        info!(status = ?response.status, message = %response.message, "Driver mount finished");

        MountOutcome { response, affinity }
    }

    pub async fn unmount(&self, request: UnmountRequest) -> DriverResponse {
        info!(target_dir = %request.target_dir, "Unmount request");
        let response = self.driver.unmount(request).await;
        info!(status = ?response.status, message = %response.message, "Driver unmount finished");
        response
    }

    async fn update_affinity(&self, target_dir: &str) -> AffinityOutcome {
        let Some(volume) = resolve_volume_id(target_dir) else {
            warn!(
                target_dir = %target_dir,
                "Cannot extract persistent volume name from target dir, skipping node affinity update"
            );
            return AffinityOutcome::Skipped;
        };

        info!(volume_id = %volume, node = %self.node_name, "Updating PV with affinity for node");
        match self.control_plane.update_affinity(&volume, &self.node_name).await {
            Ok(()) => AffinityOutcome::Updated(volume),
            Err(e) => {
                error!(
                    volume_id = %volume,
                    node = %self.node_name,
                    error = %e,
                    "Cannot update Persistent Volume node affinity"
                );
                AffinityOutcome::Failed {
                    volume,
                    error: e.to_string(),
                }
            }
        }
    }
}
