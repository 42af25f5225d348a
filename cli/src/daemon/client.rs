// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for forwarding driver verbs to the daemon

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use local_volume_core::domain::protocol::{DriverResponse, MountRequest, UnmountRequest};
use local_volume_core::presentation::api::{
    AFFINITY_ERROR_HEADER, ENDPOINT_INIT, ENDPOINT_MOUNT, ENDPOINT_UNMOUNT,
};

#[derive(Debug, Clone)]
pub struct DaemonClient {
    client: Client,
    base_url: String,
}

impl DaemonClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn init(&self) -> Result<DriverResponse> {
        self.call(ENDPOINT_INIT, &serde_json::json!({})).await
    }

    pub async fn mount(&self, request: &MountRequest) -> Result<DriverResponse> {
        self.call(ENDPOINT_MOUNT, request).await
    }

    pub async fn unmount(&self, request: &UnmountRequest) -> Result<DriverResponse> {
        self.call(ENDPOINT_UNMOUNT, request).await
    }

    async fn call<T: serde::Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<DriverResponse> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach daemon at {}", self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Daemon returned {} for {}: {}", status, endpoint, error_text);
        }

        if let Some(err) = response
            .headers()
            .get(AFFINITY_ERROR_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            tracing::warn!(error = %err, "Daemon could not update volume node affinity");
        }

        response
            .json()
            .await
            .context("Failed to parse driver response")
    }
}
