//! Document key layout.
//!
//! Account and request ids are restricted to `[A-Za-z0-9._@-]` before they
//! reach these helpers, so `/` and `:` are safe separators.

use earnhub_types::{DayKey, ShortCode};

pub const ACCOUNTS: &str = "accounts/";
pub const CAMPAIGNS: &str = "campaigns/";
pub const REFERRALS: &str = "referrals/";
pub const WITHDRAWALS: &str = "withdrawals/";
pub const DEPOSITS: &str = "deposits/";

pub fn account(id: &str) -> String {
    format!("{ACCOUNTS}{id}")
}

/// Tombstone of a deleted account.
pub fn deleted_account(id: &str) -> String {
    format!("deleted_accounts/{id}")
}

pub fn short_code(code: &ShortCode) -> String {
    format!("short_codes/{code}")
}

pub fn campaign(id: &str) -> String {
    format!("{CAMPAIGNS}{id}")
}

pub fn daily(account_id: &str, day: DayKey) -> String {
    format!("daily/{account_id}:{day}")
}

pub fn watched(account_id: &str, campaign_id: &str) -> String {
    format!("watched/{account_id}:{campaign_id}")
}

pub fn session(account_id: &str, campaign_id: &str) -> String {
    format!("sessions/{account_id}:{campaign_id}")
}

/// One edge per referred account.
pub fn referral(referred_id: &str) -> String {
    format!("{REFERRALS}{referred_id}")
}

pub fn history_prefix(account_id: &str) -> String {
    format!("history/{account_id}/")
}

/// Zero-padded so prefix listing returns entries in append order.
pub fn history(account_id: &str, seq: u64) -> String {
    format!("history/{account_id}/{seq:020}")
}

pub fn withdrawal(id: &str) -> String {
    format!("{WITHDRAWALS}{id}")
}

pub fn deposit(id: &str) -> String {
    format!("{DEPOSITS}{id}")
}

pub fn deposit_transaction(transaction_id: &str) -> String {
    format!("deposit_txids/{transaction_id}")
}
