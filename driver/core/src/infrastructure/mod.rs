// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure Layer
//!
//! Concrete adapters behind the domain ports: the Kubernetes API server client
//! and the host path driver.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements mod

pub mod host_path;
pub mod kubernetes;

pub use host_path::HostPathDriver;
pub use kubernetes::KubernetesControlPlane;
