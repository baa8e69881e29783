//! # EarnHub Engine
//!
//! Transactional points ledger and campaign escrow for the EarnHub rewards
//! platform. Every operation validates its input, runs one optimistic store
//! transaction, and emits one event after commit.
//!
//! ## Quick Start
//! ```bash
//! cargo run --bin earnhub
//! ```
//!
//! ## Endpoints
//! - `GET /health`, `GET /metrics`
//! - `POST /accounts`, `GET /accounts/{id}` and per-account actions
//! - `POST /campaigns`, `POST /campaigns/{id}/claim`
//! - `POST /withdrawals`, `POST /deposits` and their moderator resolution
//! - `POST /qr` - KHQR payment payload

mod accounts;
mod campaign;
pub mod clock;
pub mod config;
mod daily;
mod engine;
mod error;
pub mod events;
mod guard;
mod handlers;
mod ledger;
pub mod metrics;
mod middleware;
pub mod model;
mod moderation;
mod referral;
mod response;
mod router;
mod state;
pub mod store;
mod validation;

pub use campaign::unit_cost;
pub use config::{CoinPackage, Config, RewardConfig, StoreConfig};
pub use daily::DailyGrant;
pub use engine::Engine;
pub use error::Error;
pub use ledger::Reason;
pub use middleware::API_KEY_ENV;
pub use router::create as create_router;
pub use state::AppState;
