// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Driver Protocol Types
//!
//! Wire-level request and response bodies exchanged between the Flexvolume
//! shim and the node daemon. The JSON shape follows the Flexvolume driver
//! envelope, so the shim can print a [`DriverResponse`] verbatim.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Data transfer objects for init / mount / unmount

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Flexvolume option carrying the name of the PV (or inline volume).
pub const OPTION_PV_OR_VOLUME_NAME: &str = "kubernetes.io/pvOrVolumeName";

/// Flexvolume option carrying the requested filesystem type.
pub const OPTION_FS_TYPE: &str = "kubernetes.io/fsType";

/// Body of a `/mount` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountRequest {
    /// Absolute host path where the volume must appear
    /// (e.g. `/var/lib/kubelet/pods/<uid>/volumes/<vendor~driver>/<pv-name>`).
    pub target_dir: String,

    /// Driver-specific options forwarded by the orchestrator.
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl MountRequest {
    pub fn new(target_dir: impl Into<String>) -> Self {
        Self {
            target_dir: target_dir.into(),
            options: HashMap::new(),
        }
    }

    /// Look up a single driver option.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

/// Body of an `/unmount` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmountRequest {
    pub target_dir: String,
}

impl UnmountRequest {
    pub fn new(target_dir: impl Into<String>) -> Self {
        Self {
            target_dir: target_dir.into(),
        }
    }
}

/// Outcome reported by a driver operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverStatus {
    Success,
    Failure,
    #[serde(rename = "Not supported")]
    NotSupported,
}

/// Capabilities advertised by the driver on `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverCapabilities {
    /// Whether the driver implements the attach/detach phase.
    pub attach: bool,
}

/// Result envelope produced by the driver and returned verbatim to the caller.
///
/// The daemon never interprets or mutates these fields; a `Failure` status is
/// still framed as a successful HTTP response and the caller inspects the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverResponse {
    pub status: DriverStatus,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Device backing the mount, when the driver knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<DriverCapabilities>,
}

impl DriverResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: DriverStatus::Success,
            message: message.into(),
            device: None,
            capabilities: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: DriverStatus::Failure,
            message: message.into(),
            device: None,
            capabilities: None,
        }
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self {
            status: DriverStatus::NotSupported,
            message: message.into(),
            device: None,
            capabilities: None,
        }
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_capabilities(mut self, capabilities: DriverCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == DriverStatus::Success
    }
}
