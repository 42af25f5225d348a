// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the local-volume CLI

pub mod config;
pub mod flex;

pub use self::config::ConfigCommand;
pub use self::flex::FlexVerb;
