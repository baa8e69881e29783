//! Referral code redemption.

use crate::engine::Engine;
use crate::events::LedgerEvent;
use crate::guard::{grant_once, ReferralGuard};
use crate::ledger::{self, Reason};
use crate::metrics::METRICS;
use crate::model::{HistoryKind, ReferralEdge};
use crate::store::keys;
use crate::{validation, Error, RewardConfig};
use earnhub_types::{Money, ShortCode};
use tracing::info;

impl Engine {
    /// Redeem `code` for `account_id`: both sides are credited and
    /// `referred_by` is set, once per account.
    pub fn redeem_code(
        &self,
        cfg: &RewardConfig,
        account_id: &str,
        code: &str,
    ) -> Result<ReferralEdge, Error> {
        validation::account_id(account_id)?;
        let code = ShortCode::parse(code).map_err(|_| Error::InvalidCode)?;

        // Cheap rejections before any transaction. All three are re-checked
        // by the guard and the mapping read below.
        let account = self.account(account_id)?;
        if account.short_code == code {
            return Err(Error::SelfReferral);
        }
        if account.referred_by.is_some() {
            return Err(Error::AlreadyReferred);
        }
        let code_key = keys::short_code(&code);
        if self.store().read(&code_key)?.is_none() {
            return Err(Error::NotFound(format!("referral code {code}")));
        }

        let now = self.now_ms();
        let guard = ReferralGuard {
            account_id,
            code: &code,
        };
        let result = self.transact(|tx| {
            let referrer_id: String = tx
                .get(&code_key)?
                .ok_or_else(|| Error::NotFound(format!("referral code {code}")))?;
            if referrer_id == account_id {
                return Err(Error::SelfReferral);
            }

            grant_once(tx, &guard, now, |tx| {
                let referrer_reason = Reason::new(
                    HistoryKind::Referral,
                    format!("Referral reward: {account_id} joined"),
                );
                ledger::credit(
                    tx,
                    &referrer_id,
                    cfg.referrer_reward,
                    Money::ZERO,
                    &referrer_reason,
                    now,
                )?;
                let bonus_reason = Reason::new(HistoryKind::ReferralBonus, "Referral bonus");
                ledger::credit(tx, account_id, cfg.referred_bonus, Money::ZERO, &bonus_reason, now)?;

                let edge = ReferralEdge {
                    referrer_id: referrer_id.clone(),
                    referred_id: account_id.to_string(),
                    code: code.clone(),
                    referrer_reward: cfg.referrer_reward,
                    referred_bonus: cfg.referred_bonus,
                    created_at_ms: now,
                };
                tx.set(&keys::referral(account_id), &edge)?;
                Ok(edge)
            })
        });
        METRICS.record_grant(&result);
        let edge = result?;

        info!(
            referrer = %edge.referrer_id,
            referred = %account_id,
            code = %code,
            "Referral code redeemed"
        );
        self.emit(LedgerEvent::CodeRedeemed {
            referrer_id: edge.referrer_id.clone(),
            referred_id: account_id.to_string(),
            code: code.clone(),
        });
        Ok(edge)
    }

    /// Edges where `referrer_id` is the referrer, oldest first.
    pub fn referrals_of(&self, referrer_id: &str) -> Result<Vec<ReferralEdge>, Error> {
        validation::account_id(referrer_id)?;
        let mut edges: Vec<ReferralEdge> = self
            .store()
            .list_as::<ReferralEdge>(keys::REFERRALS)?
            .into_iter()
            .filter(|e| e.referrer_id == referrer_id)
            .collect();
        edges.sort_by_key(|e| e.created_at_ms);
        Ok(edges)
    }
}
