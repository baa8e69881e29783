//! Racing callers against the same documents. Each test fires several
//! threads at once and checks that exactly one grant lands.

use anyhow::Result;
use earnhub_engine::model::{Account, CampaignKind, Decision, NewCampaign};
use earnhub_engine::store::keys;
use earnhub_engine::{AppState, Error};
use earnhub_types::Money;
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use crate::utils::{setup_contended, Setup, MODERATOR};

const RACERS: usize = 8;

/// Run `op` on `RACERS` threads released together and collect the results.
fn race<T, F>(op: F) -> Vec<Result<T, Error>>
where
    T: Send,
    F: Fn(usize) -> Result<T, Error> + Sync,
{
    let barrier = Barrier::new(RACERS);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..RACERS)
            .map(|i| {
                let barrier = &barrier;
                let op = &op;
                scope.spawn(move || {
                    barrier.wait();
                    op(i)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("racer panicked"))
            .collect()
    })
}

fn split<T>(results: Vec<Result<T, Error>>) -> (Vec<T>, Vec<Error>) {
    let mut ok = Vec::new();
    let mut err = Vec::new();
    for r in results {
        match r {
            Ok(v) => ok.push(v),
            Err(e) => err.push(e),
        }
    }
    (ok, err)
}

fn view_campaign(s: &Setup, owner: &str, count: u32) -> Result<String> {
    s.funded(owner, 10_000)?;
    let campaign = s.engine.create_campaign(
        &s.cfg,
        owner,
        &NewCampaign {
            kind: CampaignKind::View,
            link: "https://youtube.com/watch?v=race".into(),
            count,
            duration_or_rate: 30,
        },
    )?;
    Ok(campaign.id)
}

#[test]
fn test_last_unit_goes_to_exactly_one_claimant() -> Result<()> {
    let s = setup_contended();
    let campaign_id = view_campaign(&s, "owner", 1)?;
    let claimants: Vec<String> = (0..RACERS).map(|i| format!("user{i}")).collect();
    for id in &claimants {
        s.register(id)?;
    }

    let (ok, err) = split(race(|i| {
        s.engine.claim_reward(&s.cfg, &campaign_id, &claimants[i])
    }));
    assert_eq!(ok.len(), 1);
    assert!(err.iter().all(|e| *e == Error::Exhausted), "{err:?}");
    assert_eq!(s.engine.campaign(&campaign_id)?.remaining, 0);

    let mut markers = 0;
    for id in &claimants {
        if s.engine.store().read(&keys::watched(id, &campaign_id))?.is_some() {
            markers += 1;
        }
    }
    assert_eq!(markers, 1);

    let winner = &ok[0].account.id;
    s.assert_reconciles(winner)?;
    Ok(())
}

#[test]
fn test_duplicate_claims_by_one_claimant() -> Result<()> {
    let s = setup_contended();
    let campaign_id = view_campaign(&s, "owner", 10)?;
    let before = s.register("bob")?;

    let (ok, err) = split(race(|_| s.engine.claim_reward(&s.cfg, &campaign_id, "bob")));
    assert_eq!(ok.len(), 1);
    assert!(err.iter().all(|e| *e == Error::AlreadyClaimed), "{err:?}");

    let bob = s.engine.account("bob")?;
    assert_eq!(bob.points, before.points + 30);
    assert_eq!(bob.tasks_completed, 1);
    assert_eq!(s.engine.campaign(&campaign_id)?.remaining, 9);
    s.assert_reconciles("bob")?;
    Ok(())
}

#[test]
fn test_double_check_in_grants_once() -> Result<()> {
    let s = setup_contended();
    let before = s.register("alice")?;

    let (ok, err) = split(race(|_| s.engine.check_in(&s.cfg, "alice")));
    assert_eq!(ok.len(), 1);
    assert!(err.iter().all(|e| *e == Error::AlreadyDone), "{err:?}");
    assert_eq!(
        s.engine.account("alice")?.points,
        before.points + s.cfg.daily_checkin_reward
    );
    s.assert_reconciles("alice")?;
    Ok(())
}

#[test]
fn test_redeeming_two_codes_at_once_links_one_referrer() -> Result<()> {
    let s = setup_contended();
    let first = s.register("first")?;
    let second = s.register("second")?;
    s.register("newbie")?;
    let codes = [first.short_code.clone(), second.short_code.clone()];

    let (ok, err) = split(race(|i| {
        s.engine
            .redeem_code(&s.cfg, "newbie", codes[i % 2].as_str())
    }));
    assert_eq!(ok.len(), 1);
    assert!(err.iter().all(|e| *e == Error::AlreadyReferred), "{err:?}");

    let paid: Vec<Account> = [
        s.engine.account("first")?,
        s.engine.account("second")?,
    ]
    .into_iter()
    .filter(|a| a.points > first.points)
    .collect();
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0].points, first.points + s.cfg.referrer_reward);

    let newbie = s.engine.account("newbie")?;
    assert_eq!(newbie.referred_by.as_ref(), Some(&paid[0].short_code));
    for id in ["first", "second", "newbie"] {
        s.assert_reconciles(id)?;
    }
    Ok(())
}

#[test]
fn test_withdrawal_resolves_once_under_contention() -> Result<()> {
    let s = setup_contended();
    s.funded("alice", 5_000)?;
    s.engine.store().increment(&keys::account("alice"), "tasks_completed", 10)?;
    s.engine.exchange(&s.cfg, "alice", 5_000)?;
    let five = Money::from_units(50_000);
    let request = s.engine.request_withdrawal(&s.cfg, "alice", five)?;

    let (ok, err) = split(race(|_| {
        s.engine
            .resolve_withdrawal(&s.cfg, MODERATOR, &request.id, Decision::Reject)
    }));
    assert_eq!(ok.len(), 1);
    assert!(err.iter().all(|e| *e == Error::AlreadyResolved), "{err:?}");
    assert_eq!(s.engine.account("alice")?.balance, five);
    s.assert_reconciles("alice")?;
    Ok(())
}

#[test]
fn test_concurrent_exchanges_never_overdraw() -> Result<()> {
    let s = setup_contended();
    s.funded("alice", 1_000)?;

    let (ok, err) = split(race(|_| s.engine.exchange(&s.cfg, "alice", 300)));
    assert_eq!(ok.len(), 3);
    assert!(err.iter().all(|e| *e == Error::InsufficientFunds), "{err:?}");

    let alice = s.engine.account("alice")?;
    assert_eq!(alice.points, 100);
    assert_eq!(alice.balance, Money::from_units(9_000));
    s.assert_reconciles("alice")?;
    Ok(())
}

#[test]
fn test_concurrent_registrations() -> Result<()> {
    let s = setup_contended();

    let (ok, _) = split(race(|i| s.engine.register(&s.cfg, &format!("member{i}"))));
    let codes: HashSet<_> = ok.iter().map(|a| a.short_code.clone()).collect();
    assert_eq!(ok.len(), RACERS);
    assert_eq!(codes.len(), RACERS);
    for account in &ok {
        assert_eq!(s.engine.account_by_code(account.short_code.as_str())?.id, account.id);
    }

    let (ok, err) = split(race(|_| s.engine.register(&s.cfg, "same")));
    assert_eq!(ok.len(), 1);
    assert!(err.iter().all(|e| *e == Error::AlreadyDone), "{err:?}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_app_state_serializes_blocking_calls() -> Result<()> {
    let s = setup_contended();
    s.register("alice")?;
    let state = Arc::new(AppState::with_engine(s.engine.clone(), s.cfg.clone())?);

    let tasks: Vec<_> = (0..RACERS)
        .map(|_| {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                state.run(|engine, cfg| engine.reward_ad(cfg, "alice")).await
            })
        })
        .collect();

    let mut granted = 0;
    for task in tasks {
        if task.await?.is_ok() {
            granted += 1;
        }
    }
    let cap = s.cfg.max_daily_ads.min(RACERS as u32);
    assert_eq!(granted, cap);
    assert_eq!(s.engine.daily_status("alice")?.ads_watched, cap);
    s.assert_reconciles("alice")?;
    Ok(())
}
