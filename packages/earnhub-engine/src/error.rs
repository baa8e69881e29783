//! Error types for the ledger engine.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use earnhub_types::TypesError;
use std::fmt;

/// Engine error type. Every failure is reported before or instead of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed input, rejected before any store interaction.
    Validation(String),
    /// Referral code is not a well-formed short code.
    InvalidCode,
    /// Points or balance would go negative.
    InsufficientFunds,
    /// Unresolved account, campaign, code, or request.
    NotFound(String),
    /// One-time grant already taken.
    AlreadyDone,
    /// Campaign reward already claimed by this account.
    AlreadyClaimed,
    /// Account already redeemed a referral code.
    AlreadyReferred,
    /// Moderation request is no longer pending.
    AlreadyResolved,
    /// Daily counter is at its cap.
    LimitReached,
    /// Campaign inventory depleted or campaign inactive.
    Exhausted,
    SelfReferral,
    SelfClaim,
    /// Caller is not allowed to perform the operation.
    Unauthorized(String),
    /// Store contention not resolved within the retry policy.
    ConflictRetryFailed { attempts: u32 },
    /// Document (de)serialization failure.
    Store(String),
    /// Configuration error.
    Config(String),
    /// Worker failure outside the ledger (join error, poisoned state).
    Internal(String),
}

impl Error {
    pub fn account_not_found(id: &str) -> Self {
        Self::NotFound(format!("account {id}"))
    }

    pub fn campaign_not_found(id: &str) -> Self {
        Self::NotFound(format!("campaign {id}"))
    }

    pub fn request_not_found(id: &str) -> Self {
        Self::NotFound(format!("request {id}"))
    }

    pub fn only_moderator() -> Self {
        Self::Unauthorized("only a moderator can perform this action".into())
    }

    /// Stable machine-readable code, used in HTTP bodies and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::InvalidCode => "invalid_code",
            Error::InsufficientFunds => "insufficient_funds",
            Error::NotFound(_) => "not_found",
            Error::AlreadyDone => "already_done",
            Error::AlreadyClaimed => "already_claimed",
            Error::AlreadyReferred => "already_referred",
            Error::AlreadyResolved => "already_resolved",
            Error::LimitReached => "limit_reached",
            Error::Exhausted => "exhausted",
            Error::SelfReferral => "self_referral",
            Error::SelfClaim => "self_claim",
            Error::Unauthorized(_) => "unauthorized",
            Error::ConflictRetryFailed { .. } => "conflict_retry_failed",
            Error::Store(_) => "store_error",
            Error::Config(_) => "config_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(msg) => write!(f, "validation error: {msg}"),
            Error::InvalidCode => write!(f, "invalid referral code"),
            Error::InsufficientFunds => write!(f, "insufficient funds"),
            Error::NotFound(what) => write!(f, "not found: {what}"),
            Error::AlreadyDone => write!(f, "already done"),
            Error::AlreadyClaimed => write!(f, "campaign reward already claimed"),
            Error::AlreadyReferred => write!(f, "account already referred"),
            Error::AlreadyResolved => write!(f, "request already resolved"),
            Error::LimitReached => write!(f, "daily limit reached"),
            Error::Exhausted => write!(f, "campaign exhausted"),
            Error::SelfReferral => write!(f, "cannot redeem own referral code"),
            Error::SelfClaim => write!(f, "cannot claim own campaign"),
            Error::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            Error::ConflictRetryFailed { attempts } => {
                write!(f, "transaction conflict not resolved after {attempts} attempts")
            }
            Error::Store(msg) => write!(f, "store error: {msg}"),
            Error::Config(msg) => write!(f, "config error: {msg}"),
            Error::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<TypesError> for Error {
    fn from(e: TypesError) -> Self {
        Error::Validation(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Store(e.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(_) | Error::InvalidCode | Error::SelfReferral | Error::SelfClaim => {
                StatusCode::BAD_REQUEST
            }
            Error::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyDone
            | Error::AlreadyClaimed
            | Error::AlreadyReferred
            | Error::AlreadyResolved
            | Error::Exhausted => StatusCode::CONFLICT,
            Error::LimitReached => StatusCode::TOO_MANY_REQUESTS,
            Error::Unauthorized(_) => StatusCode::FORBIDDEN,
            Error::ConflictRetryFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Store(_) | Error::Config(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({
            "success": false,
            "code": self.code(),
            "error": self.to_string()
        });
        (status, Json(body)).into_response()
    }
}
