//! Post-commit domain events.
//!
//! The engine hands one event per committed operation to an [`EventSink`].
//! Sinks are observers only: nothing they do can affect a commit.

use earnhub_types::{DayKey, Money, ShortCode};
use serde::Serialize;
use std::sync::Mutex;
use tracing::info;

use crate::model::{CampaignKind, RequestStatus};

const EVENT_STANDARD: &str = "earnhub";
const EVENT_VERSION: &str = "1.0.0";
const EVENT_JSON_PREFIX: &str = "EVENT_JSON:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum LedgerEvent {
    AccountRegistered {
        account_id: String,
        short_code: ShortCode,
        bonus: u64,
    },
    AccountDeleted {
        account_id: String,
        moderator: String,
    },
    Credited {
        account_id: String,
        points: u64,
        money: Money,
    },
    Debited {
        account_id: String,
        points: u64,
        money: Money,
    },
    Exchanged {
        account_id: String,
        coins: u64,
        money: Money,
    },
    CheckedIn {
        account_id: String,
        day: DayKey,
        reward: u64,
    },
    AdRewarded {
        account_id: String,
        day: DayKey,
        watched_today: u32,
        reward: u64,
    },
    CampaignCreated {
        campaign_id: String,
        owner_id: String,
        kind: CampaignKind,
        count: u32,
        total_cost: u64,
    },
    RewardClaimed {
        campaign_id: String,
        claimant_id: String,
        reward: u64,
        remaining: u32,
    },
    CampaignDeactivated {
        campaign_id: String,
        actor: String,
        unclaimed: u32,
    },
    CodeRedeemed {
        referrer_id: String,
        referred_id: String,
        code: ShortCode,
    },
    WithdrawalRequested {
        request_id: String,
        account_id: String,
        amount: Money,
    },
    WithdrawalResolved {
        request_id: String,
        status: RequestStatus,
        moderator: String,
    },
    DepositRequested {
        request_id: String,
        account_id: String,
        coins: u64,
    },
    DepositResolved {
        request_id: String,
        status: RequestStatus,
        moderator: String,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LedgerEvent);
}

/// Logs each event as an `EVENT_JSON:` line.
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &LedgerEvent) {
        let line = serde_json::json!({
            "standard": EVENT_STANDARD,
            "version": EVENT_VERSION,
            "payload": event,
        });
        info!(target: "earnhub::events", "{EVENT_JSON_PREFIX}{line}");
    }
}

/// Keeps every event in memory. Used by tests and local tooling.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LedgerEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &LedgerEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}
