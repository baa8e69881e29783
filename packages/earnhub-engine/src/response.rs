//! Response types for the EarnHub API.

use axum::Json;
use serde::Serialize;

/// Success envelope. Failures are rendered by `Error::into_response`.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Response from the health endpoint.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub requests: u64,
    pub documents: usize,
    pub config_version: u64,
}

#[derive(Serialize)]
pub struct QrResponse {
    pub payload: String,
}
