// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`local-volume-core`)
//!
//! HTTP surface that translates driver protocol requests into application
//! service calls. **No business logic lives here**: sequencing belongs to
//! [`crate::application::volume_service`].
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | `/init`, `/mount`, `/unmount` driver verbs + `/health` |

pub mod api;
