//! Campaign escrow: owners prepay inventory, claimants consume it one unit
//! at a time.
//!
//! Creation debits `total_cost` and inserts the campaign in one transaction.
//! A claim re-reads the campaign, decrements `remaining`, credits the
//! claimant, and writes the watched marker in one transaction. `remaining`
//! never increases and deactivation refunds nothing.

use crate::engine::Engine;
use crate::events::LedgerEvent;
use crate::guard::{grant_once, WatchedGuard};
use crate::ledger::{self, load_account, save_account, Reason};
use crate::metrics::METRICS;
use crate::model::{Campaign, CampaignKind, Claim, HistoryKind, NewCampaign, Session};
use crate::store::{keys, Transaction};
use crate::{validation, Error, RewardConfig};
use earnhub_types::Money;
use rand::Rng;
use std::sync::atomic::Ordering;
use tracing::{info, warn};

/// Points per unit for a campaign of `kind` lasting `duration_secs`.
pub fn unit_cost(cfg: &RewardConfig, kind: CampaignKind, duration_secs: u64) -> Result<u64, Error> {
    let cost = match kind {
        CampaignKind::Subscribe => cfg.subscribe_rate,
        CampaignKind::View | CampaignKind::Website => duration_secs
            .checked_mul(cfg.view_rate)
            .ok_or_else(|| Error::Validation("campaign duration too large".into()))?,
    };
    if cost == 0 {
        return Err(Error::Config("campaign rates must be positive".into()));
    }
    Ok(cost)
}

fn validate_new(cfg: &RewardConfig, new: &NewCampaign) -> Result<(), Error> {
    validation::link(&new.link)?;
    if new.count == 0 || new.count > cfg.max_campaign_count {
        return Err(Error::Validation(format!(
            "count must be between 1 and {}",
            cfg.max_campaign_count
        )));
    }
    if new.kind != CampaignKind::Subscribe && new.duration_or_rate == 0 {
        return Err(Error::Validation("duration must be at least 1 second".into()));
    }
    Ok(())
}

fn load_campaign(tx: &mut Transaction<'_>, campaign_id: &str) -> Result<Campaign, Error> {
    tx.get(&keys::campaign(campaign_id))?
        .ok_or_else(|| Error::campaign_not_found(campaign_id))
}

/// Claimability checks shared by claims and session starts.
fn ensure_claimable(campaign: &Campaign, claimant_id: &str) -> Result<(), Error> {
    if !campaign.is_claimable() {
        return Err(Error::Exhausted);
    }
    if campaign.owner_id == claimant_id {
        return Err(Error::SelfClaim);
    }
    Ok(())
}

fn check_dwell(
    tx: &mut Transaction<'_>,
    campaign: &Campaign,
    claimant_id: &str,
    now_ms: u64,
) -> Result<(), Error> {
    let session: Session = tx
        .get(&keys::session(claimant_id, &campaign.id))?
        .ok_or_else(|| Error::Validation("no viewing session started".into()))?;
    let watched_secs = now_ms.saturating_sub(session.started_at_ms) / 1_000;
    if watched_secs < campaign.required_duration_secs {
        return Err(Error::Validation(format!(
            "watched {watched_secs}s of {}s required",
            campaign.required_duration_secs
        )));
    }
    Ok(())
}

impl Engine {
    /// Escrow `count` units from the owner and open the campaign.
    pub fn create_campaign(
        &self,
        cfg: &RewardConfig,
        owner_id: &str,
        new: &NewCampaign,
    ) -> Result<Campaign, Error> {
        validation::account_id(owner_id)?;
        validate_new(cfg, new)?;
        let cost_per_unit = unit_cost(cfg, new.kind, new.duration_or_rate)?;
        let total_cost = u64::from(new.count)
            .checked_mul(cost_per_unit)
            .ok_or_else(|| Error::Validation("campaign cost too large".into()))?;

        let now = self.now_ms();
        let campaign = Campaign {
            id: format!("cmp-{:016x}", rand::thread_rng().gen::<u64>()),
            owner_id: owner_id.to_string(),
            kind: new.kind,
            link: new.link.clone(),
            cost_per_unit,
            required_duration_secs: new.duration_or_rate,
            initial_count: new.count,
            remaining: new.count,
            total_cost,
            active: true,
            created_at_ms: now,
        };
        let reason = Reason::new(
            HistoryKind::CampaignEscrow,
            format!("Campaign escrow: {} x{}", new.kind.as_str(), new.count),
        );

        self.transact(|tx| {
            if tx.exists(&keys::campaign(&campaign.id))? {
                return Err(Error::Internal(format!("campaign id {} reused", campaign.id)));
            }
            ledger::debit(tx, owner_id, total_cost, Money::ZERO, &reason, now)?;
            tx.set(&keys::campaign(&campaign.id), &campaign)
        })?;
        METRICS.campaigns_created.fetch_add(1, Ordering::Relaxed);

        info!(
            campaign = %campaign.id,
            owner = %owner_id,
            kind = new.kind.as_str(),
            count = new.count,
            total_cost,
            "Campaign created"
        );
        self.emit(LedgerEvent::CampaignCreated {
            campaign_id: campaign.id.clone(),
            owner_id: owner_id.to_string(),
            kind: campaign.kind,
            count: campaign.initial_count,
            total_cost,
        });
        Ok(campaign)
    }

    /// Consume one unit of inventory for `claimant_id`.
    ///
    /// Checked in order: inventory (`Exhausted`), ownership (`SelfClaim`),
    /// prior claim (`AlreadyClaimed`), then dwell time when enforced.
    pub fn claim_reward(
        &self,
        cfg: &RewardConfig,
        campaign_id: &str,
        claimant_id: &str,
    ) -> Result<Claim, Error> {
        validation::record_id(campaign_id)?;
        validation::account_id(claimant_id)?;
        let now = self.now_ms();

        let result = self.transact(|tx| {
            let mut campaign = load_campaign(tx, campaign_id)?;
            ensure_claimable(&campaign, claimant_id)?;

            let reward = campaign.cost_per_unit;
            let guard = WatchedGuard {
                account_id: claimant_id,
                campaign_id,
                reward,
            };
            grant_once(tx, &guard, now, |tx| {
                if cfg.enforce_dwell_time {
                    check_dwell(tx, &campaign, claimant_id, now)?;
                    tx.delete(&keys::session(claimant_id, campaign_id));
                }

                campaign.remaining -= 1;
                tx.set(&keys::campaign(campaign_id), &campaign)?;

                let reason = Reason::new(
                    HistoryKind::Task,
                    format!("Campaign reward: {}", campaign.kind.as_str()),
                );
                let mut account =
                    ledger::credit(tx, claimant_id, reward, Money::ZERO, &reason, now)?;
                account.tasks_completed += 1;
                save_account(tx, &account)?;

                Ok(Claim {
                    campaign: campaign.clone(),
                    account,
                    reward,
                })
            })
        });

        let counter = match &result {
            Ok(_) => &METRICS.claims_ok,
            Err(Error::Exhausted) => &METRICS.claims_exhausted,
            Err(_) => &METRICS.claims_rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        let claim = result?;

        info!(
            campaign = %campaign_id,
            claimant = %claimant_id,
            reward = claim.reward,
            remaining = claim.campaign.remaining,
            "Reward claimed"
        );
        self.emit(LedgerEvent::RewardClaimed {
            campaign_id: campaign_id.to_string(),
            claimant_id: claimant_id.to_string(),
            reward: claim.reward,
            remaining: claim.campaign.remaining,
        });
        Ok(claim)
    }

    /// Stamp the server-side start of a viewing session. An existing session
    /// is kept so reopening the page does not restart the timer.
    pub fn begin_session(&self, campaign_id: &str, claimant_id: &str) -> Result<Session, Error> {
        validation::record_id(campaign_id)?;
        validation::account_id(claimant_id)?;
        let now = self.now_ms();

        self.transact(|tx| {
            let campaign = load_campaign(tx, campaign_id)?;
            ensure_claimable(&campaign, claimant_id)?;
            if tx.exists(&keys::watched(claimant_id, campaign_id))? {
                return Err(Error::AlreadyClaimed);
            }
            load_account(tx, claimant_id)?;

            let key = keys::session(claimant_id, campaign_id);
            if let Some(existing) = tx.get::<Session>(&key)? {
                return Ok(existing);
            }
            let session = Session {
                account_id: claimant_id.to_string(),
                campaign_id: campaign_id.to_string(),
                started_at_ms: now,
            };
            tx.set(&key, &session)?;
            Ok(session)
        })
    }

    /// Stop further claims. Remaining escrow stays with the campaign.
    pub fn deactivate(
        &self,
        cfg: &RewardConfig,
        campaign_id: &str,
        actor: &str,
    ) -> Result<Campaign, Error> {
        validation::record_id(campaign_id)?;
        validation::account_id(actor)?;

        let campaign = self.transact(|tx| {
            let mut campaign = load_campaign(tx, campaign_id)?;
            if campaign.owner_id != actor && !cfg.is_moderator(actor) {
                return Err(Error::Unauthorized(
                    "only the owner or a moderator can deactivate a campaign".into(),
                ));
            }
            if !campaign.active {
                return Err(Error::AlreadyDone);
            }
            campaign.active = false;
            tx.set(&keys::campaign(campaign_id), &campaign)?;
            Ok(campaign)
        })?;

        if campaign.remaining > 0 {
            warn!(
                campaign = %campaign_id,
                unclaimed = campaign.remaining,
                forfeited = u64::from(campaign.remaining) * campaign.cost_per_unit,
                "Campaign deactivated with unclaimed escrow"
            );
        }
        info!(campaign = %campaign_id, actor = %actor, "Campaign deactivated");
        self.emit(LedgerEvent::CampaignDeactivated {
            campaign_id: campaign_id.to_string(),
            actor: actor.to_string(),
            unclaimed: campaign.remaining,
        });
        Ok(campaign)
    }

    pub fn campaign(&self, campaign_id: &str) -> Result<Campaign, Error> {
        validation::record_id(campaign_id)?;
        self.store()
            .get(&keys::campaign(campaign_id))?
            .ok_or_else(|| Error::campaign_not_found(campaign_id))
    }

    /// Campaigns `claimant_id` could claim right now, newest first.
    pub fn eligible_campaigns(&self, claimant_id: &str) -> Result<Vec<Campaign>, Error> {
        validation::account_id(claimant_id)?;
        let store = self.store();
        let mut eligible = Vec::new();
        for campaign in store.list_as::<Campaign>(keys::CAMPAIGNS)? {
            if !campaign.is_claimable() || campaign.owner_id == claimant_id {
                continue;
            }
            if store.read(&keys::watched(claimant_id, &campaign.id))?.is_some() {
                continue;
            }
            eligible.push(campaign);
        }
        sort_newest_first(&mut eligible);
        Ok(eligible)
    }

    pub fn campaigns_by_owner(&self, owner_id: &str) -> Result<Vec<Campaign>, Error> {
        validation::account_id(owner_id)?;
        let mut owned: Vec<Campaign> = self
            .store()
            .list_as::<Campaign>(keys::CAMPAIGNS)?
            .into_iter()
            .filter(|c| c.owner_id == owner_id)
            .collect();
        sort_newest_first(&mut owned);
        Ok(owned)
    }
}

fn sort_newest_first(campaigns: &mut [Campaign]) {
    campaigns.sort_by(|a, b| {
        b.created_at_ms
            .cmp(&a.created_at_ms)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{setup_engine, setup_engine_with, Harness};

    fn view(count: u32, secs: u64) -> NewCampaign {
        NewCampaign {
            kind: CampaignKind::View,
            link: "https://youtube.com/watch?v=abc".into(),
            count,
            duration_or_rate: secs,
        }
    }

    fn open(h: &Harness, owner: &str, points: u64, new: &NewCampaign) -> Campaign {
        h.funded(owner, points);
        h.engine.create_campaign(&h.cfg, owner, new).unwrap()
    }

    #[test]
    fn test_create_escrows_total_cost() {
        let h = setup_engine();
        let campaign = open(&h, "alice", 1_000, &view(10, 60));
        assert_eq!(campaign.cost_per_unit, 60);
        assert_eq!(campaign.total_cost, 600);
        assert_eq!((campaign.remaining, campaign.initial_count), (10, 10));
        assert!(campaign.active);
        assert_eq!(h.engine.account("alice").unwrap().points, 400);
        assert_eq!(h.engine.campaign(&campaign.id).unwrap(), campaign);

        let last = h.engine.history("alice").unwrap().pop().unwrap();
        assert_eq!(last.kind, HistoryKind::CampaignEscrow);
        assert_eq!(last.points_delta, -600);
    }

    #[test]
    fn test_subscribe_priced_per_subscriber() {
        let h = setup_engine();
        let new = NewCampaign {
            kind: CampaignKind::Subscribe,
            count: 4,
            duration_or_rate: 30,
            ..view(0, 0)
        };
        let campaign = open(&h, "alice", 1_000, &new);
        assert_eq!(campaign.cost_per_unit, h.cfg.subscribe_rate);
        assert_eq!(campaign.total_cost, 4 * h.cfg.subscribe_rate);
    }

    #[test]
    fn test_create_insufficient_writes_nothing() {
        let h = setup_engine();
        h.funded("alice", 599);
        assert_eq!(
            h.engine.create_campaign(&h.cfg, "alice", &view(10, 60)),
            Err(Error::InsufficientFunds)
        );
        assert!(h.engine.campaigns_by_owner("alice").unwrap().is_empty());
        assert_eq!(h.engine.account("alice").unwrap().points, 599);
    }

    #[test]
    fn test_create_validates_input() {
        let h = setup_engine();
        h.funded("alice", 1_000);
        for bad in [
            view(0, 60),
            view(h.cfg.max_campaign_count + 1, 1),
            view(1, 0),
            NewCampaign {
                link: "youtube.com".into(),
                ..view(1, 1)
            },
        ] {
            assert!(matches!(
                h.engine.create_campaign(&h.cfg, "alice", &bad),
                Err(Error::Validation(_))
            ));
        }
    }

    #[test]
    fn test_claim_credits_and_marks() {
        let h = setup_engine();
        let campaign = open(&h, "alice", 1_000, &view(10, 60));
        let bob = h.register("bob");

        let claim = h.engine.claim_reward(&h.cfg, &campaign.id, "bob").unwrap();
        assert_eq!(claim.reward, 60);
        assert_eq!(claim.account.points, bob.points + 60);
        assert_eq!(claim.account.tasks_completed, 1);
        assert_eq!(claim.campaign.remaining, 9);
        assert!(h
            .engine
            .store()
            .read(&keys::watched("bob", &campaign.id))
            .unwrap()
            .is_some());

        assert_eq!(
            h.engine.claim_reward(&h.cfg, &campaign.id, "bob"),
            Err(Error::AlreadyClaimed)
        );
        assert_eq!(h.engine.campaign(&campaign.id).unwrap().remaining, 9);
    }

    #[test]
    fn test_owner_cannot_claim() {
        let h = setup_engine();
        let campaign = open(&h, "alice", 1_000, &view(1, 60));
        assert_eq!(
            h.engine.claim_reward(&h.cfg, &campaign.id, "alice"),
            Err(Error::SelfClaim)
        );
    }

    #[test]
    fn test_exhausted_after_last_unit() {
        let h = setup_engine();
        let campaign = open(&h, "alice", 1_000, &view(1, 60));
        h.register("bob");
        h.register("carol");

        h.engine.claim_reward(&h.cfg, &campaign.id, "bob").unwrap();
        assert_eq!(
            h.engine.claim_reward(&h.cfg, &campaign.id, "carol"),
            Err(Error::Exhausted)
        );
        assert_eq!(h.engine.campaign(&campaign.id).unwrap().remaining, 0);
    }

    #[test]
    fn test_deactivate_stops_claims_without_refund() {
        let h = setup_engine();
        let campaign = open(&h, "alice", 1_000, &view(10, 60));
        h.register("bob");

        assert!(matches!(
            h.engine.deactivate(&h.cfg, &campaign.id, "bob"),
            Err(Error::Unauthorized(_))
        ));
        let closed = h.engine.deactivate(&h.cfg, &campaign.id, "alice").unwrap();
        assert!(!closed.active);
        assert_eq!(closed.remaining, 10);
        assert_eq!(h.engine.account("alice").unwrap().points, 400);

        assert_eq!(
            h.engine.claim_reward(&h.cfg, &campaign.id, "bob"),
            Err(Error::Exhausted)
        );
        assert_eq!(
            h.engine.deactivate(&h.cfg, &campaign.id, "mod"),
            Err(Error::AlreadyDone)
        );
    }

    #[test]
    fn test_moderator_can_deactivate() {
        let h = setup_engine();
        let campaign = open(&h, "alice", 1_000, &view(1, 60));
        assert!(!h.engine.deactivate(&h.cfg, &campaign.id, "mod").unwrap().active);
    }

    #[test]
    fn test_eligible_excludes_own_claimed_and_closed() {
        let h = setup_engine();
        let first = open(&h, "alice", 2_000, &view(5, 10));
        h.clock.advance_secs(1);
        let second = h.engine.create_campaign(&h.cfg, "alice", &view(5, 10)).unwrap();
        h.clock.advance_secs(1);
        let third = h.engine.create_campaign(&h.cfg, "alice", &view(5, 10)).unwrap();
        h.register("bob");

        let ids = |list: Vec<Campaign>| list.into_iter().map(|c| c.id).collect::<Vec<_>>();
        assert_eq!(
            ids(h.engine.eligible_campaigns("bob").unwrap()),
            vec![third.id.clone(), second.id.clone(), first.id.clone()]
        );
        assert!(h.engine.eligible_campaigns("alice").unwrap().is_empty());

        h.engine.claim_reward(&h.cfg, &second.id, "bob").unwrap();
        h.engine.deactivate(&h.cfg, &third.id, "alice").unwrap();
        assert_eq!(
            ids(h.engine.eligible_campaigns("bob").unwrap()),
            vec![first.id.clone()]
        );
        assert_eq!(h.engine.campaigns_by_owner("alice").unwrap().len(), 3);
    }

    #[test]
    fn test_dwell_time_enforced_when_enabled() {
        let h = setup_engine_with(RewardConfig {
            enforce_dwell_time: true,
            moderators: vec!["mod".into()],
            ..RewardConfig::default()
        });
        let campaign = open(&h, "alice", 1_000, &view(2, 60));
        h.register("bob");

        assert!(matches!(
            h.engine.claim_reward(&h.cfg, &campaign.id, "bob"),
            Err(Error::Validation(_))
        ));

        let session = h.engine.begin_session(&campaign.id, "bob").unwrap();
        h.clock.advance_secs(30);
        assert_eq!(h.engine.begin_session(&campaign.id, "bob").unwrap(), session);
        assert!(matches!(
            h.engine.claim_reward(&h.cfg, &campaign.id, "bob"),
            Err(Error::Validation(_))
        ));

        h.clock.advance_secs(30);
        let claim = h.engine.claim_reward(&h.cfg, &campaign.id, "bob").unwrap();
        assert_eq!(claim.campaign.remaining, 1);
        assert_eq!(
            h.engine.begin_session(&campaign.id, "bob"),
            Err(Error::AlreadyClaimed)
        );
    }

    #[test]
    fn test_claim_unknown_campaign() {
        let h = setup_engine();
        h.register("bob");
        assert_eq!(
            h.engine.claim_reward(&h.cfg, "cmp-missing", "bob"),
            Err(Error::campaign_not_found("cmp-missing"))
        );
    }
}
