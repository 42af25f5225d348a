// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Driver protocol types, the two ports the daemon depends on (`Driver`,
//! `ControlPlaneClient`), target path resolution and node configuration.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements mod

pub mod control_plane;
pub mod driver;
pub mod node_config;
pub mod path_resolver;
pub mod protocol;
