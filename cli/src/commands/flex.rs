// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Flexvolume driver shim
//!
//! The orchestrator executes the binary with a verb and positional arguments
//! and reads a single JSON driver response from stdout. Each verb is forwarded
//! to the local daemon; anything that prevents an answer from the daemon is
//! reported as a `Failure` response rather than a process error.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::Write;
use tracing::warn;

use crate::daemon::DaemonClient;
use local_volume_core::domain::protocol::{DriverResponse, MountRequest, UnmountRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlexVerb {
    Init,
    Mount {
        target_dir: String,
        options: Option<String>,
    },
    Unmount {
        target_dir: String,
    },
}

pub async fn execute(verb: FlexVerb, client: &DaemonClient) -> DriverResponse {
    match verb {
        FlexVerb::Init => forward(client.init().await),
        FlexVerb::Mount {
            target_dir,
            options,
        } => match parse_options(options.as_deref()) {
            Ok(options) => forward(client.mount(&MountRequest { target_dir, options }).await),
            Err(e) => DriverResponse::failure(format!("{:#}", e)),
        },
        FlexVerb::Unmount { target_dir } => {
            forward(client.unmount(&UnmountRequest::new(target_dir)).await)
        }
    }
}

/// Response for any verb this driver does not implement. No daemon call.
pub fn unsupported(verb: &str) -> DriverResponse {
    DriverResponse::not_supported(format!("{} is not supported", verb))
}

/// Decode the options argument; absent or blank means no options.
pub fn parse_options(json: Option<&str>) -> Result<HashMap<String, String>> {
    match json.map(str::trim) {
        None | Some("") => Ok(HashMap::new()),
        Some(raw) => serde_json::from_str(raw).context("Invalid mount options JSON"),
    }
}

/// Write the response as one JSON line on stdout.
pub fn print_response(response: &DriverResponse) -> Result<()> {
    let line = serde_json::to_string(response).context("Failed to encode driver response")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", line).context("Failed to write driver response")?;
    Ok(())
}

fn forward(result: Result<DriverResponse>) -> DriverResponse {
    result.unwrap_or_else(|e| {
        warn!(error = %format!("{:#}", e), "Daemon call failed");
        DriverResponse::failure(format!("{:#}", e))
    })
}
