//! Withdrawal and deposit requests and their one-time moderator resolution.
//!
//! Withdrawals escrow the amount at request time; rejecting refunds it.
//! Deposits have no ledger effect until approved. Every resolution re-reads
//! the request inside its transaction and fails with `AlreadyResolved` unless
//! it is still pending.

use crate::engine::Engine;
use crate::events::LedgerEvent;
use crate::ledger::{self, load_account, Reason};
use crate::metrics::METRICS;
use crate::model::{Decision, DepositRequest, HistoryKind, RequestStatus, WithdrawalRequest};
use crate::store::keys;
use crate::{validation, Error, RewardConfig};
use earnhub_types::Money;
use rand::Rng;
use std::sync::atomic::Ordering;
use tracing::info;

fn request_id(prefix: &str) -> String {
    format!("{prefix}-{:016x}", rand::thread_rng().gen::<u64>())
}

impl Engine {
    /// Escrow `amount` from the balance into a pending withdrawal.
    pub fn request_withdrawal(
        &self,
        cfg: &RewardConfig,
        account_id: &str,
        amount: Money,
    ) -> Result<WithdrawalRequest, Error> {
        validation::account_id(account_id)?;
        if !cfg.enable_withdraw {
            return Err(Error::Validation("withdrawals are disabled".into()));
        }
        if amount.is_zero() {
            return Err(Error::Validation("withdrawal amount must be positive".into()));
        }
        if !cfg.withdrawal_options.is_empty() && !cfg.withdrawal_options.contains(&amount) {
            return Err(Error::Validation(format!(
                "${amount} is not an allowed withdrawal amount"
            )));
        }

        let now = self.now_ms();
        let request = WithdrawalRequest {
            id: request_id("wd"),
            account_id: account_id.to_string(),
            amount,
            status: RequestStatus::Pending,
            created_at_ms: now,
            resolved_by: None,
            resolved_at_ms: None,
        };
        let reason = Reason::new(HistoryKind::Withdrawal, format!("Withdrawal request ${amount}"));

        self.transact(|tx| {
            let account = load_account(tx, account_id)?;
            if account.tasks_completed < cfg.min_tasks_for_withdraw {
                return Err(Error::Validation(format!(
                    "complete at least {} tasks before withdrawing ({} done)",
                    cfg.min_tasks_for_withdraw, account.tasks_completed
                )));
            }
            ledger::debit(tx, account_id, 0, amount, &reason, now)?;
            tx.set(&keys::withdrawal(&request.id), &request)
        })?;
        METRICS.withdrawals_requested.fetch_add(1, Ordering::Relaxed);

        info!(request = %request.id, account = %account_id, amount = %amount, "Withdrawal requested");
        self.emit(LedgerEvent::WithdrawalRequested {
            request_id: request.id.clone(),
            account_id: account_id.to_string(),
            amount,
        });
        Ok(request)
    }

    pub fn resolve_withdrawal(
        &self,
        cfg: &RewardConfig,
        moderator: &str,
        request_id: &str,
        decision: Decision,
    ) -> Result<WithdrawalRequest, Error> {
        validation::record_id(request_id)?;
        cfg.require_moderator(moderator)?;
        let now = self.now_ms();

        let request = self.transact(|tx| {
            let mut request: WithdrawalRequest = tx
                .get(&keys::withdrawal(request_id))?
                .ok_or_else(|| Error::request_not_found(request_id))?;
            if request.status != RequestStatus::Pending {
                return Err(Error::AlreadyResolved);
            }
            request.status = decision.status();
            request.resolved_by = Some(moderator.to_string());
            request.resolved_at_ms = Some(now);

            if decision == Decision::Reject {
                let reason = Reason::new(
                    HistoryKind::WithdrawalRefund,
                    format!("Withdrawal refund ${}", request.amount),
                );
                ledger::credit(tx, &request.account_id, 0, request.amount, &reason, now)?;
            }
            tx.set(&keys::withdrawal(request_id), &request)?;
            Ok(request)
        })?;
        METRICS.requests_resolved.fetch_add(1, Ordering::Relaxed);

        info!(
            request = %request_id,
            status = ?request.status,
            moderator = %moderator,
            "Withdrawal resolved"
        );
        self.emit(LedgerEvent::WithdrawalResolved {
            request_id: request_id.to_string(),
            status: request.status,
            moderator: moderator.to_string(),
        });
        Ok(request)
    }

    /// Record a coin purchase awaiting payment confirmation. Each payment
    /// transaction id can back at most one request.
    pub fn request_deposit(
        &self,
        cfg: &RewardConfig,
        account_id: &str,
        coins: u64,
        price: Money,
        transaction_id: &str,
    ) -> Result<DepositRequest, Error> {
        validation::account_id(account_id)?;
        validation::transaction_id(transaction_id)?;
        if !cfg.enable_buy_coins {
            return Err(Error::Validation("coin purchases are disabled".into()));
        }
        if coins == 0 {
            return Err(Error::Validation("deposit must buy at least one coin".into()));
        }
        if !cfg.coin_packages.is_empty()
            && !cfg
                .coin_packages
                .iter()
                .any(|p| p.coins == coins && p.price == price)
        {
            return Err(Error::Validation(format!(
                "no coin package offers {coins} coins for ${price}"
            )));
        }

        let txid_key = keys::deposit_transaction(transaction_id);
        if self.store().read(&txid_key)?.is_some() {
            return Err(Error::AlreadyDone);
        }

        let now = self.now_ms();
        let request = DepositRequest {
            id: request_id("dep"),
            account_id: account_id.to_string(),
            coins,
            price,
            transaction_id: transaction_id.to_string(),
            status: RequestStatus::Pending,
            created_at_ms: now,
            resolved_by: None,
            resolved_at_ms: None,
        };

        self.transact(|tx| {
            load_account(tx, account_id)?;
            if tx.exists(&txid_key)? {
                return Err(Error::AlreadyDone);
            }
            tx.set(&txid_key, &request.id)?;
            tx.set(&keys::deposit(&request.id), &request)
        })?;
        METRICS.deposits_requested.fetch_add(1, Ordering::Relaxed);

        info!(
            request = %request.id,
            account = %account_id,
            coins,
            price = %price,
            "Deposit requested"
        );
        self.emit(LedgerEvent::DepositRequested {
            request_id: request.id.clone(),
            account_id: account_id.to_string(),
            coins,
        });
        Ok(request)
    }

    pub fn resolve_deposit(
        &self,
        cfg: &RewardConfig,
        moderator: &str,
        request_id: &str,
        decision: Decision,
    ) -> Result<DepositRequest, Error> {
        validation::record_id(request_id)?;
        cfg.require_moderator(moderator)?;
        let now = self.now_ms();

        let request = self.transact(|tx| {
            let mut request: DepositRequest = tx
                .get(&keys::deposit(request_id))?
                .ok_or_else(|| Error::request_not_found(request_id))?;
            if request.status != RequestStatus::Pending {
                return Err(Error::AlreadyResolved);
            }
            request.status = decision.status();
            request.resolved_by = Some(moderator.to_string());
            request.resolved_at_ms = Some(now);

            if decision == Decision::Approve {
                let reason = Reason::new(
                    HistoryKind::Deposit,
                    format!("Bought {} coins for ${}", request.coins, request.price),
                );
                ledger::credit(tx, &request.account_id, request.coins, Money::ZERO, &reason, now)?;
            }
            tx.set(&keys::deposit(request_id), &request)?;
            Ok(request)
        })?;
        METRICS.requests_resolved.fetch_add(1, Ordering::Relaxed);

        info!(
            request = %request_id,
            status = ?request.status,
            moderator = %moderator,
            "Deposit resolved"
        );
        self.emit(LedgerEvent::DepositResolved {
            request_id: request_id.to_string(),
            status: request.status,
            moderator: moderator.to_string(),
        });
        Ok(request)
    }

    /// Pending withdrawals, oldest first.
    pub fn pending_withdrawals(&self) -> Result<Vec<WithdrawalRequest>, Error> {
        let mut pending: Vec<WithdrawalRequest> = self
            .store()
            .list_as::<WithdrawalRequest>(keys::WITHDRAWALS)?
            .into_iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .collect();
        pending.sort_by_key(|r| r.created_at_ms);
        Ok(pending)
    }

    /// Pending deposits, oldest first.
    pub fn pending_deposits(&self) -> Result<Vec<DepositRequest>, Error> {
        let mut pending: Vec<DepositRequest> = self
            .store()
            .list_as::<DepositRequest>(keys::DEPOSITS)?
            .into_iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .collect();
        pending.sort_by_key(|r| r.created_at_ms);
        Ok(pending)
    }
}
