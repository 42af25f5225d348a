// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Sequencing tests for the volume lifecycle service.
//!
//! These tests verify:
//! 1. The affinity update completes before the driver mount starts
//! 2. Affinity failures are fail-open (mount still runs, result unchanged)
//! 3. Unresolvable target dirs skip the update
//! 4. Unmount never touches the control plane

mod common;

use common::{is_affinity, is_mount, Call, Harness, NODE};
use local_volume_core::application::volume_service::AffinityOutcome;
use local_volume_core::domain::path_resolver::VolumeId;
use local_volume_core::domain::protocol::{DriverResponse, MountRequest, UnmountRequest};

const TARGET: &str = "/var/lib/kubelet/pods/cb528df9/volumes/elastic~local/pvc-abc123";

#[tokio::test]
async fn test_affinity_update_completes_before_mount() {
    let harness = Harness::healthy();

    let outcome = harness.service.mount(MountRequest::new(TARGET)).await;

    assert_eq!(
        harness.log.calls(),
        vec![
            Call::AffinityStarted {
                volume: "pvc-abc123".to_string(),
                node: NODE.to_string(),
            },
            Call::AffinityFinished {
                volume: "pvc-abc123".to_string(),
            },
            Call::Mount(MountRequest::new(TARGET)),
        ]
    );
    assert_eq!(outcome.affinity, AffinityOutcome::Updated(VolumeId::from("pvc-abc123")));
    assert_eq!(outcome.response, DriverResponse::success("ok"));
}

#[tokio::test]
async fn test_affinity_failure_still_mounts_once() {
    let harness = Harness::new(DriverResponse::success("mounted"), true);

    let outcome = harness.service.mount(MountRequest::new(TARGET)).await;

    assert_eq!(harness.log.count(is_mount), 1);
    let finished = harness
        .log
        .position(|c| matches!(c, Call::AffinityFinished { .. }))
        .unwrap();
    assert!(finished < harness.log.position(is_mount).unwrap());

    assert_eq!(outcome.response, DriverResponse::success("mounted"));
    match &outcome.affinity {
        AffinityOutcome::Failed { volume, error } => {
            assert_eq!(volume.as_str(), "pvc-abc123");
            assert!(error.contains("etcdserver"));
        }
        other => panic!("unexpected affinity outcome: {other:?}"),
    }
    assert!(outcome.affinity.error().is_some());
}

#[tokio::test]
async fn test_unresolvable_target_skips_affinity() {
    let harness = Harness::healthy();

    let outcome = harness.service.mount(MountRequest::new("/mnt/x")).await;

    assert_eq!(harness.log.count(is_affinity), 0);
    assert_eq!(harness.log.count(is_mount), 1);
    assert_eq!(outcome.affinity, AffinityOutcome::Skipped);
    assert!(outcome.affinity.error().is_none());
}

#[tokio::test]
async fn test_mount_passes_request_through_unchanged() {
    let harness = Harness::healthy();
    let mut request = MountRequest::new(TARGET);
    request
        .options
        .insert("kubernetes.io/fsType".to_string(), "xfs".to_string());

    harness.service.mount(request.clone()).await;

    assert!(harness.log.calls().contains(&Call::Mount(request)));
}

#[tokio::test]
async fn test_unmount_never_updates_affinity() {
    let harness = Harness::healthy();

    let response = harness.service.unmount(UnmountRequest::new(TARGET)).await;

    assert_eq!(harness.log.calls(), vec![Call::Unmount(UnmountRequest::new(TARGET))]);
    assert!(response.is_success());
}

#[tokio::test]
async fn test_init_returns_driver_result_verbatim() {
    let failure = DriverResponse::failure("modprobe failed");
    let harness = Harness::new(failure.clone(), false);

    let response = harness.service.init().await;

    assert_eq!(response, failure);
    assert_eq!(harness.log.calls(), vec![Call::Init]);
}

#[tokio::test]
async fn test_concurrent_mounts_keep_per_request_ordering() {
    let harness = Harness::healthy();
    let volumes = ["pvc-a", "pvc-b", "pvc-c", "pvc-d"];

    let tasks: Vec<_> = volumes
        .iter()
        .map(|v| {
            let service = harness.service.clone();
            let target = format!("/var/lib/kubelet/pods/p/volumes/elastic~local/{}", v);
            tokio::spawn(async move { service.mount(MountRequest::new(target)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    for volume in volumes {
        let target = format!("/var/lib/kubelet/pods/p/volumes/elastic~local/{}", volume);
        let finished = harness
            .log
            .position(|c| matches!(c, Call::AffinityFinished { volume: v } if v == volume))
            .unwrap();
        let mounted = harness
            .log
            .position(|c| matches!(c, Call::Mount(r) if r.target_dir == target))
            .unwrap();
        assert!(finished < mounted, "{} mounted before its affinity update", volume);
    }
    assert_eq!(harness.log.count(is_mount), volumes.len());
}
