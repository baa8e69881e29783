//! Stored documents and operation results.

use earnhub_types::{DayKey, Money, ShortCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub points: u64,
    pub balance: Money,
    /// Points ever granted as rewards. Never decreases.
    pub total_earned: u64,
    pub tasks_completed: u64,
    /// Set exactly once, by the first successful code redemption.
    #[serde(default)]
    pub referred_by: Option<ShortCode>,
    pub short_code: ShortCode,
    #[serde(default)]
    pub last_checkin: Option<DayKey>,
    /// Sequence number of the last history entry.
    #[serde(default)]
    pub history_seq: u64,
    pub created_at_ms: u64,
}

/// Left behind by a moderator deletion. The id stays retired so its history
/// and referral edge are never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedAccount {
    pub id: String,
    pub last_history_seq: u64,
    pub deleted_by: String,
    pub deleted_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignKind {
    View,
    Subscribe,
    Website,
}

impl CampaignKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CampaignKind::View => "view",
            CampaignKind::Subscribe => "subscribe",
            CampaignKind::Website => "website",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub owner_id: String,
    pub kind: CampaignKind,
    pub link: String,
    /// Points escrowed per unit; also the reward paid per claim.
    pub cost_per_unit: u64,
    pub required_duration_secs: u64,
    pub initial_count: u32,
    pub remaining: u32,
    pub total_cost: u64,
    pub active: bool,
    pub created_at_ms: u64,
}

impl Campaign {
    pub fn is_claimable(&self) -> bool {
        self.active && self.remaining > 0
    }
}

/// Request to open a campaign. `duration_or_rate` is the required viewing
/// time in seconds; for subscribe campaigns it is the minimum time on the
/// channel page and does not affect pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCampaign {
    pub kind: CampaignKind,
    pub link: String,
    pub count: u32,
    pub duration_or_rate: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStatus {
    pub account_id: String,
    pub day: DayKey,
    pub checkin_done: bool,
    pub ads_watched: u32,
}

impl DailyStatus {
    pub fn new(account_id: &str, day: DayKey) -> Self {
        Self {
            account_id: account_id.to_string(),
            day,
            checkin_done: false,
            ads_watched: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedMarker {
    pub account_id: String,
    pub campaign_id: String,
    pub reward: u64,
    pub claimed_at_ms: u64,
}

/// Server-stamped start of a viewing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub account_id: String,
    pub campaign_id: String,
    pub started_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralEdge {
    pub referrer_id: String,
    pub referred_id: String,
    pub code: ShortCode,
    pub referrer_reward: u64,
    pub referred_bonus: u64,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Signup,
    Checkin,
    Ad,
    Task,
    Referral,
    ReferralBonus,
    CampaignEscrow,
    Exchange,
    Withdrawal,
    WithdrawalRefund,
    Deposit,
    Adjustment,
}

impl HistoryKind {
    /// Credits of this kind count toward `Account::total_earned`.
    pub fn is_earning(self) -> bool {
        matches!(
            self,
            HistoryKind::Signup
                | HistoryKind::Checkin
                | HistoryKind::Ad
                | HistoryKind::Task
                | HistoryKind::Referral
                | HistoryKind::ReferralBonus
        )
    }
}

/// Append-only ledger line. Money deltas are signed ten-thousandths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub seq: u64,
    pub account_id: String,
    pub title: String,
    pub points_delta: i64,
    pub money_delta: i64,
    pub kind: HistoryKind,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn status(self) -> RequestStatus {
        match self {
            Decision::Approve => RequestStatus::Approved,
            Decision::Reject => RequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: String,
    pub account_id: String,
    pub amount: Money,
    pub status: RequestStatus,
    pub created_at_ms: u64,
    #[serde(default)]
    pub resolved_by: Option<String>,
    #[serde(default)]
    pub resolved_at_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRequest {
    pub id: String,
    pub account_id: String,
    pub coins: u64,
    pub price: Money,
    pub transaction_id: String,
    pub status: RequestStatus,
    pub created_at_ms: u64,
    #[serde(default)]
    pub resolved_by: Option<String>,
    #[serde(default)]
    pub resolved_at_ms: Option<u64>,
}

/// Outcome of a successful campaign claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claim {
    pub campaign: Campaign,
    pub account: Account,
    pub reward: u64,
}

/// Outcome of a points-to-balance exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    pub account: Account,
    pub coins: u64,
    pub money: Money,
}
