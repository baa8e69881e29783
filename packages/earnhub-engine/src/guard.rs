//! At-most-once (or at-most-N) grants.
//!
//! A guard reads its record inside the caller's transaction, so the record
//! lands in the read set. Two concurrent grants for the same key cannot both
//! commit: the loser re-runs and sees the tripped guard.

use crate::ledger::load_account;
use crate::model::{DailyStatus, WatchedMarker};
use crate::store::{keys, Transaction};
use crate::Error;
use earnhub_types::{DayKey, ShortCode};

pub(crate) trait Guard {
    /// Fail with the guard's error if the opportunity is used up.
    fn check(&self, tx: &mut Transaction<'_>) -> Result<(), Error>;

    /// Record one use of the opportunity.
    fn mark(&self, tx: &mut Transaction<'_>, now_ms: u64) -> Result<(), Error>;
}

/// Check `guard`, run `grant`, then mark the guard, all in `tx`.
///
/// A tripped guard or a failing grant returns before `mark`; the caller's
/// transaction then aborts and none of its writes are applied.
pub(crate) fn grant_once<G, T, F>(
    tx: &mut Transaction<'_>,
    guard: &G,
    now_ms: u64,
    grant: F,
) -> Result<T, Error>
where
    G: Guard + ?Sized,
    F: FnOnce(&mut Transaction<'_>) -> Result<T, Error>,
{
    guard.check(tx)?;
    let out = grant(tx)?;
    guard.mark(tx, now_ms)?;
    Ok(out)
}

pub(crate) fn load_daily(
    tx: &mut Transaction<'_>,
    account_id: &str,
    day: DayKey,
) -> Result<DailyStatus, Error> {
    Ok(tx
        .get(&keys::daily(account_id, day))?
        .unwrap_or_else(|| DailyStatus::new(account_id, day)))
}

// --- Daily check-in ---

pub(crate) struct CheckinGuard<'a> {
    pub account_id: &'a str,
    pub day: DayKey,
}

impl Guard for CheckinGuard<'_> {
    fn check(&self, tx: &mut Transaction<'_>) -> Result<(), Error> {
        if load_daily(tx, self.account_id, self.day)?.checkin_done {
            return Err(Error::AlreadyDone);
        }
        Ok(())
    }

    fn mark(&self, tx: &mut Transaction<'_>, _now_ms: u64) -> Result<(), Error> {
        let mut status = load_daily(tx, self.account_id, self.day)?;
        status.checkin_done = true;
        tx.set(&keys::daily(self.account_id, self.day), &status)?;

        let mut account = load_account(tx, self.account_id)?;
        account.last_checkin = Some(self.day);
        tx.set(&keys::account(self.account_id), &account)
    }
}

// --- Daily ad cap ---

pub(crate) struct AdCapGuard<'a> {
    pub account_id: &'a str,
    pub day: DayKey,
    pub cap: u32,
}

impl Guard for AdCapGuard<'_> {
    fn check(&self, tx: &mut Transaction<'_>) -> Result<(), Error> {
        if load_daily(tx, self.account_id, self.day)?.ads_watched >= self.cap {
            return Err(Error::LimitReached);
        }
        Ok(())
    }

    fn mark(&self, tx: &mut Transaction<'_>, _now_ms: u64) -> Result<(), Error> {
        let mut status = load_daily(tx, self.account_id, self.day)?;
        status.ads_watched += 1;
        tx.set(&keys::daily(self.account_id, self.day), &status)
    }
}

// --- Campaign claim ---

pub(crate) struct WatchedGuard<'a> {
    pub account_id: &'a str,
    pub campaign_id: &'a str,
    pub reward: u64,
}

impl Guard for WatchedGuard<'_> {
    fn check(&self, tx: &mut Transaction<'_>) -> Result<(), Error> {
        if tx.exists(&keys::watched(self.account_id, self.campaign_id))? {
            return Err(Error::AlreadyClaimed);
        }
        Ok(())
    }

    fn mark(&self, tx: &mut Transaction<'_>, now_ms: u64) -> Result<(), Error> {
        let marker = WatchedMarker {
            account_id: self.account_id.to_string(),
            campaign_id: self.campaign_id.to_string(),
            reward: self.reward,
            claimed_at_ms: now_ms,
        };
        tx.set(&keys::watched(self.account_id, self.campaign_id), &marker)
    }
}

// --- Referral redemption ---

pub(crate) struct ReferralGuard<'a> {
    pub account_id: &'a str,
    pub code: &'a ShortCode,
}

impl Guard for ReferralGuard<'_> {
    fn check(&self, tx: &mut Transaction<'_>) -> Result<(), Error> {
        if load_account(tx, self.account_id)?.referred_by.is_some() {
            return Err(Error::AlreadyReferred);
        }
        Ok(())
    }

    fn mark(&self, tx: &mut Transaction<'_>, _now_ms: u64) -> Result<(), Error> {
        let mut account = load_account(tx, self.account_id)?;
        account.referred_by = Some(self.code.clone());
        tx.set(&keys::account(self.account_id), &account)
    }
}

// --- Signup bonus ---

/// Tripped once the account document exists or the id was retired by a
/// deletion. The grant itself creates the account, so there is nothing left
/// to mark.
pub(crate) struct SignupGuard<'a> {
    pub account_id: &'a str,
}

impl Guard for SignupGuard<'_> {
    fn check(&self, tx: &mut Transaction<'_>) -> Result<(), Error> {
        if tx.exists(&keys::account(self.account_id))?
            || tx.exists(&keys::deleted_account(self.account_id))?
        {
            return Err(Error::AlreadyDone);
        }
        Ok(())
    }

    fn mark(&self, _tx: &mut Transaction<'_>, _now_ms: u64) -> Result<(), Error> {
        Ok(())
    }
}
