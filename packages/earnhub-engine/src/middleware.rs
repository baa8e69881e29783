//! Authentication, request correlation, and request counting middleware.

use crate::metrics::METRICS;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};
use subtle::ConstantTimeEq;

pub const API_KEY_ENV: &str = "EARNHUB_API_KEY";

/// Cached API key from env. `None` = dev mode (no auth).
static API_KEY: OnceLock<Option<String>> = OnceLock::new();

fn expected_api_key() -> &'static Option<String> {
    API_KEY.get_or_init(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
}

fn provided_key(request: &Request) -> Option<&str> {
    let headers = request.headers();
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        })
}

fn key_matches(provided: Option<&str>, expected: &str) -> bool {
    match provided {
        Some(key) => key.len() == expected.len() && key.as_bytes().ct_eq(expected.as_bytes()).into(),
        None => false,
    }
}

/// Validate `X-Api-Key` or `Authorization: Bearer` header.
/// Bypassed if `EARNHUB_API_KEY` is unset (dev mode).
pub async fn api_key_auth(request: Request, next: Next) -> Response {
    let expected = match expected_api_key() {
        Some(key) => key,
        None => return next.run(request).await,
    };

    if key_matches(provided_key(&request), expected) {
        return next.run(request).await;
    }
    let body = serde_json::json!({
        "success": false,
        "code": "unauthorized",
        "error": "Unauthorized: invalid or missing API key"
    });
    (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
}

/// Propagate or generate `x-request-id` for end-to-end correlation.
pub async fn inject_request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            use rand::Rng;
            let mut rng = rand::thread_rng();
            format!("ehb-{:016x}", rng.gen::<u64>())
        });

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(val) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", val);
    }

    response
}

pub async fn count_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    METRICS.http_requests.fetch_add(1, Ordering::Relaxed);
    next.run(request).await
}

/// Request correlation ID, extractable from `Request::extensions()`.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);
