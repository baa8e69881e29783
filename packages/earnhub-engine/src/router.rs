//! HTTP router setup.

use crate::handlers;
use crate::middleware::{api_key_auth, count_requests, inject_request_id, RequestId};
use crate::state::AppState;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Create the application router.
pub fn create(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/config", get(handlers::get_config).put(handlers::put_config))
        .route("/accounts", post(handlers::register))
        .route(
            "/accounts/{id}",
            get(handlers::account).delete(handlers::delete_account),
        )
        .route("/accounts/{id}/history", get(handlers::history))
        .route("/accounts/{id}/daily", get(handlers::daily_status))
        .route("/accounts/{id}/checkin", post(handlers::check_in))
        .route("/accounts/{id}/ads", post(handlers::reward_ad))
        .route("/accounts/{id}/exchange", post(handlers::exchange))
        .route(
            "/accounts/{id}/referral",
            post(handlers::redeem_code),
        )
        .route("/accounts/{id}/referrals", get(handlers::referrals))
        .route("/codes/{code}", get(handlers::account_by_code))
        .route("/campaigns", post(handlers::create_campaign))
        .route("/campaigns/{id}", get(handlers::campaign))
        .route(
            "/campaigns/eligible/{account}",
            get(handlers::eligible_campaigns),
        )
        .route("/campaigns/owned/{owner}", get(handlers::owned_campaigns))
        .route("/campaigns/{id}/session", post(handlers::begin_session))
        .route("/campaigns/{id}/claim", post(handlers::claim_reward))
        .route("/campaigns/{id}/deactivate", post(handlers::deactivate))
        .route("/withdrawals", post(handlers::request_withdrawal))
        .route("/withdrawals/pending", get(handlers::pending_withdrawals))
        .route(
            "/withdrawals/{id}/resolve",
            post(handlers::resolve_withdrawal),
        )
        .route("/deposits", post(handlers::request_deposit))
        .route("/deposits/pending", get(handlers::pending_deposits))
        .route("/deposits/{id}/resolve", post(handlers::resolve_deposit))
        .route("/qr", post(handlers::qr))
        .route_layer(middleware::from_fn(api_key_auth));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .merge(api)
        .layer(middleware::from_fn_with_state(state.clone(), count_requests))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            let req_id = request
                .extensions()
                .get::<RequestId>()
                .map(|r| r.0.as_str())
                .unwrap_or_default();
            tracing::info_span!(
                "http",
                method = %request.method(),
                uri = %request.uri(),
                req_id = %req_id,
            )
        }))
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}
