// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Path Resolver Domain Service
//!
//! Maps a mount target directory to the name of the persistent volume it
//! belongs to. Pure string work: no filesystem access, no canonicalization.
//!
//! Two conventions are recognised, in order:
//!
//! 1. The kubelet plugin layout
//!    `/var/lib/kubelet/pods/<pod-uid>/volumes/<vendor~driver>/<pv-name>[/...]`,
//!    where the PV name is the component right after the `<vendor~driver>`
//!    segment.
//! 2. Any component carrying the dynamic-provisioning prefix `pvc-`
//!    (the last one wins), e.g. `/var/lib/kubelet/pods/<uid>/pvc-abc123/mount`.
//!
//! A candidate must also be a valid PV name (a DNS-1123 subdomain), so the
//! result is always safe to place in an API path. Paths matching neither
//! convention resolve to `None`; callers treat that as a soft condition.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements internal responsibilities for path resolution

use serde::{Deserialize, Serialize};
use std::fmt;

/// Directory segment under which kubelet lays out per-plugin volume dirs.
const KUBELET_VOLUMES_SEGMENT: &str = "volumes";

/// Separator kubelet uses between vendor and driver name in the plugin dir.
const PLUGIN_DIR_SEPARATOR: char = '~';

/// Longest name Kubernetes accepts for a persistent volume.
const MAX_VOLUME_NAME_LEN: usize = 253;

/// Name prefix of dynamically provisioned persistent volumes.
pub const DYNAMIC_PV_PREFIX: &str = "pvc-";

/// Name of a persistent volume, derived fresh from each request's target dir.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeId(pub String);

impl VolumeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VolumeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Extract the persistent volume name from a mount target directory.
///
/// # Examples
/// ```
/// use local_volume_core::domain::path_resolver::{resolve_volume_id, VolumeId};
///
/// let id = resolve_volume_id(
///     "/var/lib/kubelet/pods/cb528df9/volumes/elastic~local/pvc-cb5033a1",
/// );
/// assert_eq!(id, Some(VolumeId::from("pvc-cb5033a1")));
///
/// assert_eq!(resolve_volume_id("/mnt/x"), None);
/// ```
pub fn resolve_volume_id(target_dir: &str) -> Option<VolumeId> {
    let components: Vec<&str> = target_dir
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();

    from_plugin_layout(&components)
        .or_else(|| from_dynamic_prefix(&components))
        .map(VolumeId::from)
}

fn from_plugin_layout<'a>(components: &[&'a str]) -> Option<&'a str> {
    components.windows(3).find_map(|window| match window {
        [volumes, plugin, name]
            if *volumes == KUBELET_VOLUMES_SEGMENT
                && plugin.contains(PLUGIN_DIR_SEPARATOR)
                && is_volume_name(name) =>
        {
            Some(*name)
        }
        _ => None,
    })
}

fn from_dynamic_prefix<'a>(components: &[&'a str]) -> Option<&'a str> {
    components
        .iter()
        .rev()
        .find(|c| {
            c.len() > DYNAMIC_PV_PREFIX.len()
                && c.starts_with(DYNAMIC_PV_PREFIX)
                && is_volume_name(c)
        })
        .copied()
}

/// PV names are DNS-1123 subdomains: lowercase alphanumerics, `-` and `.`,
/// starting and ending with an alphanumeric.
fn is_volume_name(component: &str) -> bool {
    let bytes = component.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    component.len() <= MAX_VOLUME_NAME_LEN
        && is_lower_alphanumeric(*first)
        && is_lower_alphanumeric(*last)
        && bytes
            .iter()
            .all(|b| is_lower_alphanumeric(*b) || *b == b'-' || *b == b'.')
}

fn is_lower_alphanumeric(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}
