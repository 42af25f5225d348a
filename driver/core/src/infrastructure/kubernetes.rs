// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Kubernetes Control Plane Client
//!
//! Records persistent volume node affinity through the Kubernetes API server.
//! Implements the ControlPlaneClient trait as an Anti-Corruption Layer.
//!
//! # API Endpoints
//!
//! - `PATCH /api/v1/persistentvolumes/{name}` with
//!   `Content-Type: application/merge-patch+json`
//!
//! The patch replaces `spec.nodeAffinity.required.nodeSelectorTerms` with a
//! single term pinning the volume to one node. A JSON merge patch replaces
//! lists wholesale, so the call is idempotent and needs no prior read.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::control_plane::{ControlPlaneClient, ControlPlaneError};
use crate::domain::node_config::ControlPlaneConfig;
use crate::domain::path_resolver::VolumeId;

const MERGE_PATCH_CONTENT_TYPE: &str = "application/merge-patch+json";

/// Kubernetes API server adapter
pub struct KubernetesControlPlane {
    client: Client,

    /// API server base URL (e.g., "https://10.96.0.1:443")
    api_server: String,

    /// Service account token file, re-read on every call so rotated
    /// tokens are picked up
    token_path: Option<PathBuf>,

    /// Node label matched by the affinity term (e.g. "kubernetes.io/hostname")
    node_label_key: String,
}

impl KubernetesControlPlane {
    /// Create an unauthenticated client against `api_server`.
    pub fn new(
        api_server: impl Into<String>,
        node_label_key: impl Into<String>,
    ) -> Result<Self, ControlPlaneError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ControlPlaneError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_server: api_server.into().trim_end_matches('/').to_string(),
            token_path: None,
            node_label_key: node_label_key.into(),
        })
    }

    /// Build a client from node configuration.
    ///
    /// The token and CA files are optional; they are used when present, which
    /// is the in-cluster service account layout.
    pub fn from_config(config: &ControlPlaneConfig) -> Result<Self, ControlPlaneError> {
        let api_server = config.resolve_api_server().ok_or_else(|| {
            ControlPlaneError::Configuration(
                "no api_server configured and KUBERNETES_SERVICE_HOST is not set".to_string(),
            )
        })?;

        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_seconds));

        let ca_path = PathBuf::from(&config.ca_path);
        if ca_path.exists() {
            let pem = std::fs::read(&ca_path).map_err(|e| {
                ControlPlaneError::Configuration(format!(
                    "Failed to read CA bundle {}: {}",
                    ca_path.display(),
                    e
                ))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| ControlPlaneError::Configuration(format!("Invalid CA bundle: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| ControlPlaneError::Configuration(e.to_string()))?;

        let token_path = PathBuf::from(&config.token_path);
        let token_path = if token_path.exists() {
            Some(token_path)
        } else {
            tracing::warn!(
                token_path = %config.token_path,
                "Service account token not found, API requests will be unauthenticated"
            );
            None
        };

        Ok(Self {
            client,
            api_server: api_server.trim_end_matches('/').to_string(),
            token_path,
            node_label_key: config.node_label_key.clone(),
        })
    }

    /// Use the bearer token stored at `path`.
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.api_server, path)
    }

    fn affinity_patch(&self, node: &str) -> serde_json::Value {
        json!({
            "spec": {
                "nodeAffinity": {
                    "required": {
                        "nodeSelectorTerms": [{
                            "matchExpressions": [{
                                "key": self.node_label_key,
                                "operator": "In",
                                "values": [node],
                            }]
                        }]
                    }
                }
            }
        })
    }

    async fn bearer_token(&self) -> Result<Option<String>, ControlPlaneError> {
        let Some(path) = &self.token_path else {
            return Ok(None);
        };
        let token = tokio::fs::read_to_string(path).await.map_err(|e| {
            ControlPlaneError::Configuration(format!(
                "Failed to read token {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Some(token.trim().to_string()))
    }
}

#[async_trait]
impl ControlPlaneClient for KubernetesControlPlane {
    async fn update_affinity(
        &self,
        volume: &VolumeId,
        node: &str,
    ) -> Result<(), ControlPlaneError> {
        let url = self.build_url(&format!("/api/v1/persistentvolumes/{}", volume));
        let body = serde_json::to_vec(&self.affinity_patch(node))?;

        let mut request = self
            .client
            .patch(&url)
            .header(header::CONTENT_TYPE, MERGE_PATCH_CONTENT_TYPE)
            .header(header::ACCEPT, "application/json")
            .body(body);

        if let Some(token) = self.bearer_token().await? {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        match response.status() {
            status if status.is_success() => {
                tracing::debug!(volume_id = %volume, node = %node, "PV node affinity updated");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(ControlPlaneError::NotFound(volume.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let error_msg = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "access denied".to_string());
                Err(ControlPlaneError::Unauthorized(error_msg))
            }
            status => {
                let error_msg = response
                    .text()
                    .await
                    .unwrap_or_else(|_| format!("HTTP {}", status));
                Err(ControlPlaneError::Api {
                    status: status.as_u16(),
                    message: error_msg,
                })
            }
        }
    }
}
