// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Driver protocol HTTP surface.
//!
//! One endpoint per verb, any method. Bodies are read as raw bytes and decoded
//! here so an undecodable body maps to a 500 with the decoder's message, the
//! same framing used when a response cannot be encoded. A driver-reported
//! failure is not an HTTP error: it travels in the JSON body with 200.

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::error;

use crate::application::volume_service::VolumeService;
use crate::domain::protocol::{DriverResponse, MountRequest, UnmountRequest};

pub const ENDPOINT_INIT: &str = "/init";
pub const ENDPOINT_MOUNT: &str = "/mount";
pub const ENDPOINT_UNMOUNT: &str = "/unmount";
pub const ENDPOINT_HEALTH: &str = "/health";

/// Carries the affinity update error on an otherwise normal mount response.
pub const AFFINITY_ERROR_HEADER: &str = "x-affinity-error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("cannot encode driver response: {0}")]
    Encode(#[source] serde_json::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self, "Request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

pub struct AppState {
    pub volume_service: Arc<VolumeService>,
    pub start_time: Instant,
}

pub fn app(volume_service: Arc<VolumeService>) -> Router {
    let state = Arc::new(AppState {
        volume_service,
        start_time: Instant::now(),
    });

    Router::new()
        .route(ENDPOINT_INIT, any(init_handler))
        .route(ENDPOINT_MOUNT, any(mount_handler))
        .route(ENDPOINT_UNMOUNT, any(unmount_handler))
        .route(ENDPOINT_HEALTH, get(health_handler))
        .with_state(state)
}

async fn init_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let response = state.volume_service.init().await;
    encode(&response)
}

async fn mount_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: MountRequest = decode(&body)?;
    let outcome = state.volume_service.mount(request).await;

    let mut response = encode(&outcome.response)?;
    if let Some(err) = outcome.affinity.error() {
        if let Ok(value) = HeaderValue::from_str(&header_safe(err)) {
            response.headers_mut().insert(AFFINITY_ERROR_HEADER, value);
        }
    }
    Ok(response)
}

async fn unmount_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: UnmountRequest = decode(&body)?;
    let response = state.volume_service.unmount(request).await;
    encode(&response)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "node": state.volume_service.node_name(),
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(ApiError::Decode)
}

fn encode(response: &DriverResponse) -> Result<Response, ApiError> {
    let body = serde_json::to_vec(response).map_err(ApiError::Encode)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Header values must be visible ASCII on a single line.
fn header_safe(message: &str) -> String {
    message
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_maps_to_plain_500() {
        let err = decode::<MountRequest>(b"{not json").unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
    }

    #[test]
    fn test_encode_sets_json_content_type() {
        let response = encode(&DriverResponse::success("ok")).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn test_encode_error_maps_to_plain_500() {
        // JSON object keys must be strings
        let unencodable = std::collections::BTreeMap::from([(vec![1u8], 1u8)]);
        let err = serde_json::to_vec(&unencodable).unwrap_err();

        let response = ApiError::Encode(err).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("cannot encode driver response:"), "{}", text);
    }

    #[test]
    fn test_header_safe() {
        assert_eq!(header_safe("line one\nline two"), "line one?line two");
        assert_eq!(header_safe("forbidden: ü"), "forbidden: ?");
    }
}
