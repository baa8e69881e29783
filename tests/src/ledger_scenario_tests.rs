//! End-to-end ledger scenarios across accounts, campaigns, referrals, and
//! moderation, driven through the public `Engine` API.

use anyhow::Result;
use earnhub_engine::events::LedgerEvent;
use earnhub_engine::model::{CampaignKind, Decision, HistoryKind, NewCampaign, RequestStatus};
use earnhub_engine::{Error, Reason, RewardConfig, StoreConfig};
use earnhub_types::{khqr, Money};

use crate::utils::{default_rewards, reference_crc, setup_engine, setup_engine_with, MODERATOR};

fn view(count: u32, secs: u64) -> NewCampaign {
    NewCampaign {
        kind: CampaignKind::View,
        link: "https://youtube.com/watch?v=earnhub".into(),
        count,
        duration_or_rate: secs,
    }
}

// ── Campaign escrow ─────────────────────────────────────────────────

#[test]
fn test_campaign_escrow_scenario() -> Result<()> {
    let s = setup_engine();
    s.funded("a", 1_000)?;
    let b = s.register("b")?;

    let campaign = s.engine.create_campaign(&s.cfg, "a", &view(10, 60))?;
    assert_eq!(campaign.total_cost, 600);
    assert_eq!(campaign.remaining, 10);
    assert_eq!(s.engine.account("a")?.points, 400);

    let claim = s.engine.claim_reward(&s.cfg, &campaign.id, "b")?;
    assert_eq!(claim.account.points, b.points + 60);
    assert_eq!(claim.campaign.remaining, 9);
    assert!(s.engine.eligible_campaigns("b")?.is_empty());

    assert_eq!(
        s.engine.claim_reward(&s.cfg, &campaign.id, "b").unwrap_err(),
        Error::AlreadyClaimed
    );
    assert_eq!(s.engine.campaign(&campaign.id)?.remaining, 9);

    s.assert_reconciles("a")?;
    s.assert_reconciles("b")?;
    Ok(())
}

#[test]
fn test_escrow_is_conserved_across_claims() -> Result<()> {
    let s = setup_engine();
    s.funded("owner", 5_000)?;
    let campaign = s.engine.create_campaign(&s.cfg, "owner", &view(4, 25))?;

    let mut paid = 0;
    for id in ["c1", "c2", "c3", "c4", "c5"] {
        s.register(id)?;
        match s.engine.claim_reward(&s.cfg, &campaign.id, id) {
            Ok(claim) => paid += claim.reward,
            Err(e) => assert_eq!(e, Error::Exhausted),
        }
    }
    let campaign = s.engine.campaign(&campaign.id)?;
    assert_eq!(campaign.remaining, 0);
    assert_eq!(paid, campaign.total_cost);
    Ok(())
}

// ── Withdrawals ─────────────────────────────────────────────────────

#[test]
fn test_withdrawal_reject_scenario() -> Result<()> {
    let cfg = RewardConfig {
        min_tasks_for_withdraw: 0,
        ..default_rewards()
    };
    let s = setup_engine_with(cfg, StoreConfig::default());
    s.funded("alice", 5_000)?;
    let five = Money::from_units(50_000);

    let exchanged = s.engine.exchange(&s.cfg, "alice", 5_000)?;
    assert_eq!(exchanged.account.balance, five);
    assert_eq!(exchanged.account.balance.to_string(), "5.0000");

    let request = s.engine.request_withdrawal(&s.cfg, "alice", five)?;
    assert_eq!(s.engine.account("alice")?.balance, Money::ZERO);

    s.engine
        .resolve_withdrawal(&s.cfg, MODERATOR, &request.id, Decision::Reject)?;
    assert_eq!(s.engine.account("alice")?.balance, five);
    let refund = s.engine.history("alice")?.pop().expect("refund entry");
    assert_eq!(refund.kind, HistoryKind::WithdrawalRefund);
    assert_eq!(refund.money_delta, 50_000);

    assert_eq!(
        s.engine
            .resolve_withdrawal(&s.cfg, MODERATOR, &request.id, Decision::Reject)
            .unwrap_err(),
        Error::AlreadyResolved
    );
    assert_eq!(s.engine.account("alice")?.balance, five);
    s.assert_reconciles("alice")?;
    Ok(())
}

#[test]
fn test_full_earning_journey() -> Result<()> {
    let s = setup_engine();
    s.register("alice")?;
    s.register("bob")?;

    // Alice buys coins and funds five one-unit campaigns.
    let package = s
        .cfg
        .coin_packages
        .iter()
        .find(|p| p.id == "popular")
        .cloned()
        .expect("default package");
    let deposit =
        s.engine
            .request_deposit(&s.cfg, "alice", package.coins, package.price, "KHQR-7781")?;
    s.engine
        .resolve_deposit(&s.cfg, MODERATOR, &deposit.id, Decision::Approve)?;

    let mut campaigns = Vec::new();
    for _ in 0..5 {
        campaigns.push(s.engine.create_campaign(&s.cfg, "alice", &view(1, 200))?);
        s.clock.advance_secs(1);
    }
    assert_eq!(s.engine.eligible_campaigns("bob")?.len(), 5);

    // Bob redeems Alice's code, works through the campaigns, and cashes out.
    let alice_code = s.engine.account("alice")?.short_code;
    s.engine.redeem_code(&s.cfg, "bob", alice_code.as_str())?;
    for campaign in &campaigns {
        s.engine.claim_reward(&s.cfg, &campaign.id, "bob")?;
    }
    let bob = s.engine.account("bob")?;
    assert_eq!(bob.tasks_completed, 5);
    assert_eq!(
        bob.points,
        s.cfg.signup_bonus + s.cfg.referred_bonus + 5 * 200
    );
    assert_eq!(bob.total_earned, bob.points);

    s.engine.exchange(&s.cfg, "bob", 1_000)?;
    let one = Money::from_units(10_000);
    let request = s.engine.request_withdrawal(&s.cfg, "bob", one)?;
    let approved =
        s.engine
            .resolve_withdrawal(&s.cfg, MODERATOR, &request.id, Decision::Approve)?;
    assert_eq!(approved.status, RequestStatus::Approved);
    assert_eq!(s.engine.account("bob")?.balance, Money::ZERO);

    let alice = s.engine.account("alice")?;
    assert_eq!(
        alice.points,
        s.cfg.signup_bonus + package.coins + s.cfg.referrer_reward - 1_000
    );
    assert_eq!(s.engine.referrals_of("alice")?.len(), 1);

    s.assert_reconciles("alice")?;
    s.assert_reconciles("bob")?;
    Ok(())
}

// ── Deletion ────────────────────────────────────────────────────────

#[test]
fn test_deleted_account_history_stays_append_only() -> Result<()> {
    let s = setup_engine();
    let referrer = s.register("carol")?;
    s.funded("alice", 500)?;
    s.engine.redeem_code(&s.cfg, "alice", referrer.short_code.as_str())?;
    let last = s.engine.account("alice")?;
    s.assert_reconciles("alice")?;
    let before = s.engine.history("alice")?;
    let edges = s.engine.referrals_of("carol")?;

    s.engine.delete_account(&s.cfg, MODERATOR, "alice")?;
    s.clock.advance_secs(3_600);
    assert_eq!(
        s.engine.register(&s.cfg, "alice").unwrap_err(),
        Error::AlreadyDone
    );

    let after = s.engine.history("alice")?;
    assert_eq!(after, before);
    assert_eq!(after.len() as u64, last.history_seq);
    let points: i64 = after.iter().map(|e| e.points_delta).sum();
    assert_eq!(points, last.points as i64);
    assert_eq!(s.engine.referrals_of("carol")?, edges);
    Ok(())
}

// ── Events ──────────────────────────────────────────────────────────

#[test]
fn test_events_follow_commits_only() -> Result<()> {
    let s = setup_engine();
    s.register("alice")?;
    let _ = s.engine.register(&s.cfg, "alice");
    let _ = s
        .engine
        .debit("alice", 10_000, Money::ZERO, Reason::new(HistoryKind::Adjustment, "x"));
    s.engine.check_in(&s.cfg, "alice")?;

    let names: Vec<&'static str> = s
        .events
        .events()
        .iter()
        .map(|e| match e {
            LedgerEvent::AccountRegistered { .. } => "registered",
            LedgerEvent::CheckedIn { .. } => "checked_in",
            _ => "other",
        })
        .collect();
    assert_eq!(names, vec!["registered", "checked_in"]);
    Ok(())
}

// ── KHQR ────────────────────────────────────────────────────────────

#[test]
fn test_khqr_crc_recomputes_independently() -> Result<()> {
    let payload = khqr::encode("monsela@aclb", Money::from_units(10_000), "KH Market")?;
    assert_eq!(
        payload,
        "00020101021229330013kh.com.bakong0112monsela@aclb52045999530384054041.005802KH5909KH Market6010PHNOM PENH63047820"
    );

    let (prefix, crc) = payload.split_at(payload.len() - 4);
    assert!(prefix.ends_with("6304"));
    assert_eq!(crc, format!("{:04X}", reference_crc(prefix.as_bytes())));
    assert!(khqr::verify(&payload));
    Ok(())
}
