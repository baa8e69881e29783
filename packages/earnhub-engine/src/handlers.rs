//! HTTP request handlers.
//!
//! Each handler parses its body, then runs one engine call on the blocking
//! pool against the current reward snapshot.

use crate::config::RewardConfig;
use crate::daily::DailyGrant;
use crate::metrics::METRICS;
use crate::model::{
    Account, Campaign, Claim, DailyStatus, Decision, DepositRequest, Exchange, HistoryEntry,
    NewCampaign, ReferralEdge, Session, WithdrawalRequest,
};
use crate::response::{ApiResponse, HealthResponse, QrResponse};
use crate::state::AppState;
use crate::Error;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use earnhub_types::{khqr, Money};
use serde::Deserialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

type ApiResult<T> = Result<Json<ApiResponse<T>>, Error>;

// --- Request bodies ---

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub account_id: String,
}

#[derive(Deserialize)]
pub struct ModeratorQuery {
    pub moderator: String,
}

#[derive(Deserialize)]
pub struct ExchangeRequest {
    pub coins: u64,
}

#[derive(Deserialize)]
pub struct RedeemRequest {
    pub code: String,
}

#[derive(Deserialize)]
pub struct CreateCampaignRequest {
    pub owner_id: String,
    #[serde(flatten)]
    pub campaign: NewCampaign,
}

#[derive(Deserialize)]
pub struct ClaimantRequest {
    pub account_id: String,
}

#[derive(Deserialize)]
pub struct DeactivateRequest {
    pub actor: String,
}

#[derive(Deserialize)]
pub struct WithdrawalBody {
    pub account_id: String,
    pub amount: Money,
}

#[derive(Deserialize)]
pub struct DepositBody {
    pub account_id: String,
    pub coins: u64,
    pub price: Money,
    pub transaction_id: String,
}

#[derive(Deserialize)]
pub struct ResolveRequest {
    pub moderator: String,
    pub decision: Decision,
}

#[derive(Deserialize)]
pub struct QrRequest {
    pub merchant_id: String,
    pub amount: Money,
    pub merchant_name: String,
}

#[derive(Deserialize)]
pub struct ConfigUpdate {
    pub moderator: String,
    pub config: RewardConfig,
}

// --- Operational ---

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        requests: state.request_count.load(Ordering::Relaxed),
        documents: state.engine.store().document_count(),
        config_version: state.rewards().version,
    })
}

/// Prometheus metrics in text exposition format.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = METRICS.render(
        state.engine.store().document_count(),
        state.rewards().version,
    );
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        body,
    )
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> ApiResult<RewardConfig> {
    Ok(ApiResponse::ok(state.rewards().as_ref().clone()))
}

/// `PUT /config`: moderator-only snapshot replacement.
pub async fn put_config(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ConfigUpdate>,
) -> ApiResult<RewardConfig> {
    let snapshot = state.replace_rewards(&body.moderator, body.config)?;
    Ok(ApiResponse::ok(snapshot.as_ref().clone()))
}

// --- Accounts ---

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Account>>), Error> {
    let account = state
        .run(move |engine, cfg| engine.register(cfg, &body.account_id))
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(account)))
}

pub async fn account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Account> {
    let account = state.run(move |engine, _| engine.account(&id)).await?;
    Ok(ApiResponse::ok(account))
}

pub async fn account_by_code(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> ApiResult<Account> {
    let account = state
        .run(move |engine, _| engine.account_by_code(&code))
        .await?;
    Ok(ApiResponse::ok(account))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<HistoryEntry>> {
    let entries = state.run(move |engine, _| engine.history(&id)).await?;
    Ok(ApiResponse::ok(entries))
}

pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ModeratorQuery>,
) -> ApiResult<Account> {
    let account = state
        .run(move |engine, cfg| engine.delete_account(cfg, &query.moderator, &id))
        .await?;
    Ok(ApiResponse::ok(account))
}

pub async fn daily_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<DailyStatus> {
    let status = state.run(move |engine, _| engine.daily_status(&id)).await?;
    Ok(ApiResponse::ok(status))
}

pub async fn check_in(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<DailyGrant> {
    let grant = state.run(move |engine, cfg| engine.check_in(cfg, &id)).await?;
    Ok(ApiResponse::ok(grant))
}

pub async fn reward_ad(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<DailyGrant> {
    let grant = state.run(move |engine, cfg| engine.reward_ad(cfg, &id)).await?;
    Ok(ApiResponse::ok(grant))
}

pub async fn exchange(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ExchangeRequest>,
) -> ApiResult<Exchange> {
    let exchange = state
        .run(move |engine, cfg| engine.exchange(cfg, &id, body.coins))
        .await?;
    Ok(ApiResponse::ok(exchange))
}

pub async fn redeem_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RedeemRequest>,
) -> ApiResult<ReferralEdge> {
    let edge = state
        .run(move |engine, cfg| engine.redeem_code(cfg, &id, &body.code))
        .await?;
    Ok(ApiResponse::ok(edge))
}

pub async fn referrals(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ReferralEdge>> {
    let edges = state.run(move |engine, _| engine.referrals_of(&id)).await?;
    Ok(ApiResponse::ok(edges))
}

// --- Campaigns ---

pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Campaign>>), Error> {
    let campaign = state
        .run(move |engine, cfg| engine.create_campaign(cfg, &body.owner_id, &body.campaign))
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(campaign)))
}

pub async fn campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Campaign> {
    let campaign = state.run(move |engine, _| engine.campaign(&id)).await?;
    Ok(ApiResponse::ok(campaign))
}

pub async fn eligible_campaigns(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
) -> ApiResult<Vec<Campaign>> {
    let campaigns = state
        .run(move |engine, _| engine.eligible_campaigns(&account))
        .await?;
    Ok(ApiResponse::ok(campaigns))
}

pub async fn owned_campaigns(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> ApiResult<Vec<Campaign>> {
    let campaigns = state
        .run(move |engine, _| engine.campaigns_by_owner(&owner))
        .await?;
    Ok(ApiResponse::ok(campaigns))
}

pub async fn begin_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ClaimantRequest>,
) -> ApiResult<Session> {
    let session = state
        .run(move |engine, _| engine.begin_session(&id, &body.account_id))
        .await?;
    Ok(ApiResponse::ok(session))
}

pub async fn claim_reward(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ClaimantRequest>,
) -> ApiResult<Claim> {
    let claim = state
        .run(move |engine, cfg| engine.claim_reward(cfg, &id, &body.account_id))
        .await?;
    Ok(ApiResponse::ok(claim))
}

pub async fn deactivate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<DeactivateRequest>,
) -> ApiResult<Campaign> {
    let campaign = state
        .run(move |engine, cfg| engine.deactivate(cfg, &id, &body.actor))
        .await?;
    Ok(ApiResponse::ok(campaign))
}

// --- Moderation ---

pub async fn request_withdrawal(
    State(state): State<Arc<AppState>>,
    Json(body): Json<WithdrawalBody>,
) -> Result<(StatusCode, Json<ApiResponse<WithdrawalRequest>>), Error> {
    let request = state
        .run(move |engine, cfg| engine.request_withdrawal(cfg, &body.account_id, body.amount))
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(request)))
}

pub async fn pending_withdrawals(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<WithdrawalRequest>> {
    let pending = state
        .run(|engine, _| engine.pending_withdrawals())
        .await?;
    Ok(ApiResponse::ok(pending))
}

pub async fn resolve_withdrawal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ResolveRequest>,
) -> ApiResult<WithdrawalRequest> {
    let request = state
        .run(move |engine, cfg| {
            engine.resolve_withdrawal(cfg, &body.moderator, &id, body.decision)
        })
        .await?;
    Ok(ApiResponse::ok(request))
}

pub async fn request_deposit(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DepositBody>,
) -> Result<(StatusCode, Json<ApiResponse<DepositRequest>>), Error> {
    let request = state
        .run(move |engine, cfg| {
            engine.request_deposit(
                cfg,
                &body.account_id,
                body.coins,
                body.price,
                &body.transaction_id,
            )
        })
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(request)))
}

pub async fn pending_deposits(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<DepositRequest>> {
    let pending = state.run(|engine, _| engine.pending_deposits()).await?;
    Ok(ApiResponse::ok(pending))
}

pub async fn resolve_deposit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ResolveRequest>,
) -> ApiResult<DepositRequest> {
    let request = state
        .run(move |engine, cfg| engine.resolve_deposit(cfg, &body.moderator, &id, body.decision))
        .await?;
    Ok(ApiResponse::ok(request))
}

// --- Payments ---

/// `POST /qr`: KHQR payload for a merchant payment.
pub async fn qr(Json(body): Json<QrRequest>) -> ApiResult<QrResponse> {
    let payload = khqr::encode(&body.merchant_id, body.amount, &body.merchant_name)?;
    Ok(ApiResponse::ok(QrResponse { payload }))
}
