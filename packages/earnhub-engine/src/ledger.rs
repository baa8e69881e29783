//! Account ledger: credit, debit, and exchange.
//!
//! Every mutation of `points` or `balance` goes through [`post`], which
//! re-reads the account inside the caller's transaction, rejects any result
//! below zero, and appends exactly one history entry with the same deltas.

use crate::engine::Engine;
use crate::events::LedgerEvent;
use crate::model::{Account, Exchange, HistoryEntry, HistoryKind};
use crate::store::{keys, Transaction};
use crate::{validation, Error, RewardConfig};
use earnhub_types::Money;
use tracing::{debug, info};

/// Why a ledger line was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reason {
    pub kind: HistoryKind,
    pub title: String,
}

impl Reason {
    pub fn new(kind: HistoryKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
        }
    }
}

pub(crate) fn load_account(tx: &mut Transaction<'_>, account_id: &str) -> Result<Account, Error> {
    tx.get(&keys::account(account_id))?
        .ok_or_else(|| Error::account_not_found(account_id))
}

pub(crate) fn save_account(tx: &mut Transaction<'_>, account: &Account) -> Result<(), Error> {
    tx.set(&keys::account(&account.id), account)
}

fn signed(amount: u64) -> Result<i64, Error> {
    i64::try_from(amount).map_err(|_| Error::Validation(format!("amount {amount} too large")))
}

fn apply(current: u64, delta: i64) -> Result<u64, Error> {
    if delta >= 0 {
        current
            .checked_add(delta.unsigned_abs())
            .ok_or_else(|| Error::Validation("amount overflows account".into()))
    } else {
        current
            .checked_sub(delta.unsigned_abs())
            .ok_or(Error::InsufficientFunds)
    }
}

/// Apply signed deltas to one account and append the matching history entry.
pub(crate) fn post(
    tx: &mut Transaction<'_>,
    account_id: &str,
    points_delta: i64,
    money_delta: i64,
    reason: &Reason,
    now_ms: u64,
) -> Result<Account, Error> {
    let mut account = load_account(tx, account_id)?;

    account.points = apply(account.points, points_delta)?;
    account.balance = Money::from_units(apply(account.balance.units(), money_delta)?);
    if reason.kind.is_earning() && points_delta > 0 {
        account.total_earned = account.total_earned.saturating_add(points_delta.unsigned_abs());
    }

    account.history_seq += 1;
    let entry = HistoryEntry {
        seq: account.history_seq,
        account_id: account.id.clone(),
        title: reason.title.clone(),
        points_delta,
        money_delta,
        kind: reason.kind,
        created_at_ms: now_ms,
    };
    tx.set(&keys::history(&account.id, entry.seq), &entry)?;
    save_account(tx, &account)?;
    Ok(account)
}

pub(crate) fn credit(
    tx: &mut Transaction<'_>,
    account_id: &str,
    points: u64,
    money: Money,
    reason: &Reason,
    now_ms: u64,
) -> Result<Account, Error> {
    post(tx, account_id, signed(points)?, signed(money.units())?, reason, now_ms)
}

pub(crate) fn debit(
    tx: &mut Transaction<'_>,
    account_id: &str,
    points: u64,
    money: Money,
    reason: &Reason,
    now_ms: u64,
) -> Result<Account, Error> {
    post(tx, account_id, -signed(points)?, -signed(money.units())?, reason, now_ms)
}

impl Engine {
    /// Add points and/or balance. Fails with `NotFound` for an unknown account.
    pub fn credit(
        &self,
        account_id: &str,
        points: u64,
        money: Money,
        reason: Reason,
    ) -> Result<Account, Error> {
        validation::account_id(account_id)?;
        let now = self.now_ms();
        let account = self.transact(|tx| credit(tx, account_id, points, money, &reason, now))?;

        info!(account = %account_id, points, money = %money, kind = ?reason.kind, "Credited");
        self.emit(LedgerEvent::Credited {
            account_id: account_id.to_string(),
            points,
            money,
        });
        Ok(account)
    }

    /// Remove points and/or balance, authorized against a fresh read.
    pub fn debit(
        &self,
        account_id: &str,
        points: u64,
        money: Money,
        reason: Reason,
    ) -> Result<Account, Error> {
        validation::account_id(account_id)?;
        let now = self.now_ms();
        let account = self.transact(|tx| debit(tx, account_id, points, money, &reason, now))?;

        info!(account = %account_id, points, money = %money, kind = ?reason.kind, "Debited");
        self.emit(LedgerEvent::Debited {
            account_id: account_id.to_string(),
            points,
            money,
        });
        Ok(account)
    }

    /// Convert points to balance at `cfg.exchange_rate` points per unit.
    pub fn exchange(
        &self,
        cfg: &RewardConfig,
        account_id: &str,
        coins: u64,
    ) -> Result<Exchange, Error> {
        validation::account_id(account_id)?;
        if coins == 0 {
            return Err(Error::Validation("exchange amount must be positive".into()));
        }
        let money = Money::from_exchange(coins, cfg.exchange_rate)
            .ok_or_else(|| Error::Config("exchange_rate must be positive".into()))?;
        if money.is_zero() {
            return Err(Error::Validation(format!(
                "{coins} points is below the smallest exchangeable amount"
            )));
        }

        let now = self.now_ms();
        let reason = Reason::new(
            HistoryKind::Exchange,
            format!("Exchanged {coins} points for ${money}"),
        );
        let account = self.transact(|tx| {
            post(tx, account_id, -signed(coins)?, signed(money.units())?, &reason, now)
        })?;

        debug!(account = %account_id, rate = cfg.exchange_rate, "Exchange rate applied");
        info!(account = %account_id, coins, money = %money, "Exchanged points");
        self.emit(LedgerEvent::Exchanged {
            account_id: account_id.to_string(),
            coins,
            money,
        });
        Ok(Exchange {
            account,
            coins,
            money,
        })
    }
}
