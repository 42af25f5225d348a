// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Recording test doubles for the driver and control-plane ports.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use local_volume_core::application::volume_service::VolumeService;
use local_volume_core::domain::control_plane::{ControlPlaneClient, ControlPlaneError};
use local_volume_core::domain::driver::Driver;
use local_volume_core::domain::path_resolver::VolumeId;
use local_volume_core::domain::protocol::{DriverResponse, MountRequest, UnmountRequest};

pub const NODE: &str = "worker-1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Init,
    AffinityStarted { volume: String, node: String },
    AffinityFinished { volume: String },
    Mount(MountRequest),
    Unmount(UnmountRequest),
}

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls().iter().position(pred)
    }
}

pub struct RecordingDriver {
    pub log: CallLog,
    pub response: DriverResponse,
}

#[async_trait]
impl Driver for RecordingDriver {
    async fn init(&self) -> DriverResponse {
        self.log.push(Call::Init);
        self.response.clone()
    }

    async fn mount(&self, request: MountRequest) -> DriverResponse {
        self.log.push(Call::Mount(request));
        self.response.clone()
    }

    async fn unmount(&self, request: UnmountRequest) -> DriverResponse {
        self.log.push(Call::Unmount(request));
        self.response.clone()
    }
}

/// Control plane double. Yields to the runtime mid-call so a mount that did
/// not wait for the update would be observed out of order.
pub struct RecordingControlPlane {
    pub log: CallLog,
    pub fail: bool,
}

#[async_trait]
impl ControlPlaneClient for RecordingControlPlane {
    async fn update_affinity(
        &self,
        volume: &VolumeId,
        node: &str,
    ) -> Result<(), ControlPlaneError> {
        self.log.push(Call::AffinityStarted {
            volume: volume.to_string(),
            node: node.to_string(),
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.log.push(Call::AffinityFinished {
            volume: volume.to_string(),
        });

        if self.fail {
            Err(ControlPlaneError::Api {
                status: 500,
                message: "etcdserver: request timed out".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

pub struct Harness {
    pub log: CallLog,
    pub service: Arc<VolumeService>,
}

impl Harness {
    pub fn new(driver_response: DriverResponse, affinity_fails: bool) -> Self {
        let log = CallLog::default();
        let driver = Arc::new(RecordingDriver {
            log: log.clone(),
            response: driver_response,
        });
        let control_plane = Arc::new(RecordingControlPlane {
            log: log.clone(),
            fail: affinity_fails,
        });
        let service = Arc::new(VolumeService::new(driver, control_plane, NODE));
        Self { log, service }
    }

    pub fn healthy() -> Self {
        Self::new(DriverResponse::success("ok"), false)
    }
}

pub fn is_affinity(call: &Call) -> bool {
    matches!(call, Call::AffinityStarted { .. } | Call::AffinityFinished { .. })
}

pub fn is_mount(call: &Call) -> bool {
    matches!(call, Call::Mount(_))
}
