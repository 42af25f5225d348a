// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Host Path Volume Driver
//!
//! Backs each volume with a directory under a fixed host location and
//! bind-mounts it onto the target dir kubelet hands us.
//!
//! **Layout:**
//! - `<volumes_dir>/<pv-name>` - backing directory, survives pod restarts
//! - `<target_dir>` - bind mount of the backing directory
//!
//! **Limitations:**
//! - No capacity enforcement (the volume shares the host filesystem)
//! - Requires CAP_SYS_ADMIN for the bind mount
//!
//! Every failure is reported inside the [`DriverResponse`] envelope.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::driver::Driver;
use crate::domain::node_config::DriverConfig;
use crate::domain::path_resolver::resolve_volume_id;
use crate::domain::protocol::{
    DriverCapabilities, DriverResponse, MountRequest, UnmountRequest, OPTION_PV_OR_VOLUME_NAME,
};

const DEFAULT_MOUNTS_TABLE: &str = "/proc/self/mounts";

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Cannot determine volume name for target {0}")]
    UnknownVolume(String),

    #[error("Invalid volume name: {0}")]
    InvalidVolumeName(String),

    #[error("Target dir must be an absolute path, got '{0}'")]
    InvalidTarget(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{binary} failed: {reason}")]
    Command { binary: String, reason: String },
}

/// Host path driver
pub struct HostPathDriver {
    volumes_dir: PathBuf,
    mount_binary: String,
    umount_binary: String,
    mounts_table: PathBuf,
}

impl HostPathDriver {
    pub fn new(config: &DriverConfig) -> Self {
        Self {
            volumes_dir: PathBuf::from(&config.volumes_dir),
            mount_binary: config.mount_binary.clone(),
            umount_binary: config.umount_binary.clone(),
            mounts_table: PathBuf::from(DEFAULT_MOUNTS_TABLE),
        }
    }

    /// Read mount points from `path` instead of `/proc/self/mounts`.
    pub fn with_mounts_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.mounts_table = path.into();
        self
    }

    fn volume_name(request: &MountRequest) -> Result<String, DriverError> {
        let name = request
            .option(OPTION_PV_OR_VOLUME_NAME)
            .map(str::to_string)
            .or_else(|| resolve_volume_id(&request.target_dir).map(|id| id.0))
            .or_else(|| {
                Path::new(&request.target_dir)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
            })
            .ok_or_else(|| DriverError::UnknownVolume(request.target_dir.clone()))?;

        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(DriverError::InvalidVolumeName(name));
        }
        Ok(name)
    }

    async fn is_mounted(&self, target_dir: &str) -> Result<bool, DriverError> {
        let table = tokio::fs::read_to_string(&self.mounts_table)
            .await
            .map_err(|source| DriverError::Io {
                path: self.mounts_table.display().to_string(),
                source,
            })?;

        let target = normalize(target_dir);
        Ok(table
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1))
            .any(|mount_point| unescape_mount_point(mount_point) == target))
    }

    async fn run(&self, binary: &str, args: &[&str]) -> Result<(), DriverError> {
        debug!(binary = %binary, args = ?args, "Running mount helper");
        let output = Command::new(binary)
            .args(args)
            .output()
            .await
            .map_err(|e| DriverError::Command {
                binary: binary.to_string(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(DriverError::Command {
                binary: binary.to_string(),
                reason: if stderr.is_empty() {
                    output.status.to_string()
                } else {
                    stderr
                },
            })
        }
    }

    async fn try_mount(&self, request: &MountRequest) -> Result<DriverResponse, DriverError> {
        validate_target(&request.target_dir)?;
        let name = Self::volume_name(request)?;
        let source = self.volumes_dir.join(&name);

        create_dir_all(&source).await?;
        create_dir_all(Path::new(&request.target_dir)).await?;

        let device = source.display().to_string();
        if self.is_mounted(&request.target_dir).await? {
            return Ok(DriverResponse::success(format!(
                "{} already mounted at {}",
                name, request.target_dir
            ))
            .with_device(device));
        }

        self.run(
            &self.mount_binary,
            &["--bind", "--", &device, &request.target_dir],
        )
        .await?;

        Ok(
            DriverResponse::success(format!("{} mounted at {}", name, request.target_dir))
                .with_device(device),
        )
    }

    async fn try_unmount(&self, request: &UnmountRequest) -> Result<DriverResponse, DriverError> {
        validate_target(&request.target_dir)?;
        if !self.is_mounted(&request.target_dir).await? {
            return Ok(DriverResponse::success(format!(
                "{} is not mounted",
                request.target_dir
            )));
        }

        self.run(&self.umount_binary, &["--", &request.target_dir])
            .await?;
        Ok(DriverResponse::success(format!(
            "{} unmounted",
            request.target_dir
        )))
    }
}

#[async_trait]
impl Driver for HostPathDriver {
    async fn init(&self) -> DriverResponse {
        DriverResponse::success("local volume driver initialized")
            .with_capabilities(DriverCapabilities { attach: false })
    }

    async fn mount(&self, request: MountRequest) -> DriverResponse {
        match self.try_mount(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(target_dir = %request.target_dir, error = %e, "Mount failed");
                DriverResponse::failure(e.to_string())
            }
        }
    }

    async fn unmount(&self, request: UnmountRequest) -> DriverResponse {
        match self.try_unmount(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(target_dir = %request.target_dir, error = %e, "Unmount failed");
                DriverResponse::failure(e.to_string())
            }
        }
    }
}

async fn create_dir_all(path: &Path) -> Result<(), DriverError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| DriverError::Io {
            path: path.display().to_string(),
            source,
        })
}

/// Target dirs are handed to the mount helpers, so only absolute paths pass.
fn validate_target(target_dir: &str) -> Result<(), DriverError> {
    if Path::new(target_dir).is_absolute() {
        Ok(())
    } else {
        Err(DriverError::InvalidTarget(target_dir.to_string()))
    }
}

fn normalize(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// Decode the octal escapes the kernel uses in mount tables (`\040` for space).
fn unescape_mount_point(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits
                    .iter()
                    .fold(0u16, |acc, d| acc * 8 + u16::from(d - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
