//! Service configuration and the reward-rate snapshot passed into every engine call.

use earnhub_types::Money;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Top-level configuration, loaded from `earnhub.toml` and `EARNHUB_*` env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "defaults::bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub rewards: RewardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: defaults::bind_address(),
            store: StoreConfig::default(),
            rewards: RewardConfig::default(),
        }
    }
}

/// Transaction retry policy of the in-process store.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Attempts per transaction before `ConflictRetryFailed`.
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
        }
    }
}

/// A purchasable coin bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinPackage {
    pub id: String,
    pub coins: u64,
    pub price: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Reward rates, caps, and feature toggles.
///
/// Treated as an immutable snapshot: callers pass `&RewardConfig` into each
/// operation and swap in a new value (with a higher `version`) to change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardConfig {
    #[serde(default)]
    pub version: u64,
    #[serde(default = "defaults::daily_checkin_reward")]
    pub daily_checkin_reward: u64,
    #[serde(default = "defaults::signup_bonus")]
    pub signup_bonus: u64,
    #[serde(default = "defaults::referrer_reward")]
    pub referrer_reward: u64,
    #[serde(default = "defaults::referred_bonus")]
    pub referred_bonus: u64,
    #[serde(default = "defaults::ads_reward")]
    pub ads_reward: u64,
    #[serde(default = "defaults::max_daily_ads")]
    pub max_daily_ads: u32,
    /// Points per one whole unit of balance.
    #[serde(default = "defaults::exchange_rate")]
    pub exchange_rate: u64,
    #[serde(default = "defaults::min_tasks_for_withdraw")]
    pub min_tasks_for_withdraw: u64,
    /// Allowed withdrawal amounts. Empty means any amount.
    #[serde(default = "defaults::withdrawal_options")]
    pub withdrawal_options: Vec<Money>,
    #[serde(default = "defaults::enabled")]
    pub enable_buy_coins: bool,
    #[serde(default = "defaults::enabled")]
    pub enable_withdraw: bool,
    /// Purchasable bundles. Empty means any (coins, price) pair is accepted.
    #[serde(default = "defaults::coin_packages")]
    pub coin_packages: Vec<CoinPackage>,
    /// Points per second of required viewing for view and website campaigns.
    #[serde(default = "defaults::view_rate")]
    pub view_rate: u64,
    /// Points per subscriber for subscribe campaigns.
    #[serde(default = "defaults::subscribe_rate")]
    pub subscribe_rate: u64,
    #[serde(default = "defaults::max_campaign_count")]
    pub max_campaign_count: u32,
    /// Require a server-stamped session older than the campaign duration.
    #[serde(default)]
    pub enforce_dwell_time: bool,
    #[serde(default)]
    pub moderators: Vec<String>,
    #[serde(default = "defaults::short_code_attempts")]
    pub short_code_attempts: u32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            version: 0,
            daily_checkin_reward: defaults::daily_checkin_reward(),
            signup_bonus: defaults::signup_bonus(),
            referrer_reward: defaults::referrer_reward(),
            referred_bonus: defaults::referred_bonus(),
            ads_reward: defaults::ads_reward(),
            max_daily_ads: defaults::max_daily_ads(),
            exchange_rate: defaults::exchange_rate(),
            min_tasks_for_withdraw: defaults::min_tasks_for_withdraw(),
            withdrawal_options: defaults::withdrawal_options(),
            enable_buy_coins: true,
            enable_withdraw: true,
            coin_packages: defaults::coin_packages(),
            view_rate: defaults::view_rate(),
            subscribe_rate: defaults::subscribe_rate(),
            max_campaign_count: defaults::max_campaign_count(),
            enforce_dwell_time: false,
            moderators: Vec::new(),
            short_code_attempts: defaults::short_code_attempts(),
        }
    }
}

impl RewardConfig {
    /// Reject snapshots the engine cannot operate with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.exchange_rate == 0 {
            return Err(Error::Config("exchange_rate must be positive".into()));
        }
        if self.view_rate == 0 || self.subscribe_rate == 0 {
            return Err(Error::Config("campaign rates must be positive".into()));
        }
        if self.max_campaign_count == 0 {
            return Err(Error::Config("max_campaign_count must be positive".into()));
        }
        if self.short_code_attempts == 0 {
            return Err(Error::Config("short_code_attempts must be positive".into()));
        }
        if self.coin_packages.iter().any(|p| p.coins == 0) {
            return Err(Error::Config("coin packages must grant coins".into()));
        }
        Ok(())
    }

    pub fn is_moderator(&self, account_id: &str) -> bool {
        self.moderators.iter().any(|m| m == account_id)
    }

    pub fn require_moderator(&self, account_id: &str) -> Result<(), Error> {
        if self.is_moderator(account_id) {
            Ok(())
        } else {
            Err(Error::only_moderator())
        }
    }

    /// Successor snapshot: same values as `next`, version bumped past `self`.
    pub fn succeeded_by(&self, mut next: RewardConfig) -> RewardConfig {
        next.version = self.version + 1;
        next
    }
}

mod defaults {
    use earnhub_types::Money;

    use super::CoinPackage;

    pub fn bind_address() -> String {
        "0.0.0.0:3050".into()
    }

    pub fn max_attempts() -> u32 {
        5
    }

    pub fn daily_checkin_reward() -> u64 {
        50
    }

    pub fn signup_bonus() -> u64 {
        100
    }

    pub fn referrer_reward() -> u64 {
        200
    }

    pub fn referred_bonus() -> u64 {
        100
    }

    pub fn ads_reward() -> u64 {
        20
    }

    pub fn max_daily_ads() -> u32 {
        10
    }

    pub fn exchange_rate() -> u64 {
        1_000
    }

    pub fn min_tasks_for_withdraw() -> u64 {
        5
    }

    pub fn withdrawal_options() -> Vec<Money> {
        [1, 5, 10]
            .into_iter()
            .filter_map(Money::from_whole)
            .collect()
    }

    pub fn enabled() -> bool {
        true
    }

    pub fn coin_packages() -> Vec<CoinPackage> {
        vec![
            CoinPackage {
                id: "starter".into(),
                coins: 1_000,
                price: Money::from_units(9_900),
                tag: None,
            },
            CoinPackage {
                id: "popular".into(),
                coins: 5_500,
                price: Money::from_units(49_900),
                tag: Some("Popular".into()),
            },
            CoinPackage {
                id: "pro".into(),
                coins: 12_000,
                price: Money::from_units(99_900),
                tag: Some("Best value".into()),
            },
        ]
    }

    pub fn view_rate() -> u64 {
        1
    }

    pub fn subscribe_rate() -> u64 {
        50
    }

    pub fn max_campaign_count() -> u32 {
        10_000
    }

    pub fn short_code_attempts() -> u32 {
        8
    }
}
