// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Volume Driver Trait - Anti-Corruption Layer for host storage
//!
//! The daemon depends on the local storage mechanism only through these three
//! operations and their [`DriverResponse`] envelope. Implementations report
//! failures inside the envelope (`status: Failure`), never as transport
//! errors.

use async_trait::async_trait;

use crate::domain::protocol::{DriverResponse, MountRequest, UnmountRequest};

/// Local volume driver.
///
/// Implementations must be safe to call concurrently from several in-flight
/// requests, and each verb must be idempotent: a retried `mount` of an
/// already-mounted target or `unmount` of an absent one reports success.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Initialize the driver plugin.
    async fn init(&self) -> DriverResponse;

    /// Make the volume described by `request` appear at `request.target_dir`.
    async fn mount(&self, request: MountRequest) -> DriverResponse;

    /// Remove the mount at `request.target_dir`.
    async fn unmount(&self, request: UnmountRequest) -> DriverResponse;
}
