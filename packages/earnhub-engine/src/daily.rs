//! Daily check-in and ad rewards, keyed by UTC calendar day.

use crate::engine::Engine;
use crate::events::LedgerEvent;
use crate::guard::{grant_once, load_daily, AdCapGuard, CheckinGuard};
use crate::ledger::{self, Reason};
use crate::metrics::METRICS;
use crate::model::{Account, DailyStatus, HistoryKind};
use crate::store::keys;
use crate::{validation, Error, RewardConfig};
use earnhub_types::Money;
use serde::Serialize;
use tracing::info;

/// Account state after a daily grant, with the day's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyGrant {
    pub account: Account,
    pub status: DailyStatus,
    pub reward: u64,
}

impl Engine {
    pub fn check_in(&self, cfg: &RewardConfig, account_id: &str) -> Result<DailyGrant, Error> {
        validation::account_id(account_id)?;
        let now = self.now_ms();
        let day = self.today()?;
        let guard = CheckinGuard { account_id, day };
        let reason = Reason::new(HistoryKind::Checkin, "Daily check-in");
        let reward = cfg.daily_checkin_reward;

        let result = self.transact(|tx| {
            grant_once(tx, &guard, now, |tx| {
                ledger::credit(tx, account_id, reward, Money::ZERO, &reason, now)
            })?;
            Ok(DailyGrant {
                account: ledger::load_account(tx, account_id)?,
                status: load_daily(tx, account_id, day)?,
                reward,
            })
        });
        METRICS.record_grant(&result);
        let grant = result?;

        info!(account = %account_id, day = %day, reward, "Checked in");
        self.emit(LedgerEvent::CheckedIn {
            account_id: account_id.to_string(),
            day,
            reward,
        });
        Ok(grant)
    }

    pub fn reward_ad(&self, cfg: &RewardConfig, account_id: &str) -> Result<DailyGrant, Error> {
        validation::account_id(account_id)?;
        let now = self.now_ms();
        let day = self.today()?;
        let guard = AdCapGuard {
            account_id,
            day,
            cap: cfg.max_daily_ads,
        };
        let reason = Reason::new(HistoryKind::Ad, "Ad reward");
        let reward = cfg.ads_reward;

        let result = self.transact(|tx| {
            let account = grant_once(tx, &guard, now, |tx| {
                ledger::credit(tx, account_id, reward, Money::ZERO, &reason, now)
            })?;
            Ok(DailyGrant {
                account,
                status: load_daily(tx, account_id, day)?,
                reward,
            })
        });
        METRICS.record_grant(&result);
        let grant = result?;

        info!(
            account = %account_id,
            watched = grant.status.ads_watched,
            cap = cfg.max_daily_ads,
            "Ad rewarded"
        );
        self.emit(LedgerEvent::AdRewarded {
            account_id: account_id.to_string(),
            day,
            watched_today: grant.status.ads_watched,
            reward,
        });
        Ok(grant)
    }

    /// Today's counters. A day with no activity reads as all-zero.
    pub fn daily_status(&self, account_id: &str) -> Result<DailyStatus, Error> {
        self.account(account_id)?;
        let day = self.today()?;
        Ok(self
            .store()
            .get(&keys::daily(account_id, day))?
            .unwrap_or_else(|| DailyStatus::new(account_id, day)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::setup_engine;

    #[test]
    fn test_check_in_credits_once_per_day() {
        let h = setup_engine();
        let before = h.register("alice");

        let grant = h.engine.check_in(&h.cfg, "alice").unwrap();
        assert_eq!(grant.account.points, before.points + h.cfg.daily_checkin_reward);
        assert!(grant.status.checkin_done);
        assert_eq!(grant.account.last_checkin, Some(grant.status.day));

        assert_eq!(h.engine.check_in(&h.cfg, "alice"), Err(Error::AlreadyDone));
        assert_eq!(
            h.engine.account("alice").unwrap().points,
            before.points + h.cfg.daily_checkin_reward
        );
    }

    #[test]
    fn test_check_in_resets_next_day() {
        let h = setup_engine();
        h.register("alice");
        h.engine.check_in(&h.cfg, "alice").unwrap();

        h.clock.advance_secs(24 * 60 * 60);
        let grant = h.engine.check_in(&h.cfg, "alice").unwrap();
        assert_eq!(grant.status.day.to_string(), "2024-03-02");
        assert_eq!(
            grant.account.points,
            h.cfg.signup_bonus + 2 * h.cfg.daily_checkin_reward
        );
    }

    #[test]
    fn test_check_in_unknown_account_leaves_no_status() {
        let h = setup_engine();
        assert_eq!(
            h.engine.check_in(&h.cfg, "ghost"),
            Err(Error::account_not_found("ghost"))
        );
        h.register("ghost");
        assert!(!h.engine.daily_status("ghost").unwrap().checkin_done);
    }

    #[test]
    fn test_ads_capped_per_day() {
        let h = setup_engine();
        let cfg = RewardConfig {
            max_daily_ads: 2,
            ..h.cfg.clone()
        };
        h.register("alice");

        assert_eq!(h.engine.reward_ad(&cfg, "alice").unwrap().status.ads_watched, 1);
        assert_eq!(h.engine.reward_ad(&cfg, "alice").unwrap().status.ads_watched, 2);
        assert_eq!(h.engine.reward_ad(&cfg, "alice"), Err(Error::LimitReached));

        let status = h.engine.daily_status("alice").unwrap();
        assert_eq!(status.ads_watched, 2);
        assert_eq!(
            h.engine.account("alice").unwrap().points,
            h.cfg.signup_bonus + 2 * cfg.ads_reward
        );
    }
}
