//! Registration, short-code allocation, account queries, moderator deletion.

use crate::engine::Engine;
use crate::events::LedgerEvent;
use crate::guard::{grant_once, SignupGuard};
use crate::ledger::{self, load_account, save_account, Reason};
use crate::metrics::METRICS;
use crate::model::{Account, DeletedAccount, HistoryEntry, HistoryKind};
use crate::store::{keys, Transaction};
use crate::{validation, Error, RewardConfig};
use earnhub_types::{Money, ShortCode, SHORT_CODE_ALPHABET, SHORT_CODE_LEN};
use rand::Rng;
use tracing::{debug, info};

/// Draw random codes until one has no mapping, reading each candidate inside
/// `tx` so a concurrent registration of the same code forces a re-run.
pub(crate) fn allocate_short_code<R: Rng + ?Sized>(
    tx: &mut Transaction<'_>,
    rng: &mut R,
    attempts: u32,
) -> Result<ShortCode, Error> {
    for _ in 0..attempts {
        let indices: [usize; SHORT_CODE_LEN] =
            std::array::from_fn(|_| rng.gen_range(0..SHORT_CODE_ALPHABET.len()));
        let code = ShortCode::from_indices(indices);
        if !tx.exists(&keys::short_code(&code))? {
            return Ok(code);
        }
        debug!(code = %code, "Short code taken, drawing another");
    }
    Err(Error::ConflictRetryFailed { attempts })
}

impl Engine {
    /// Create an account with a fresh short code and the signup bonus.
    pub fn register(&self, cfg: &RewardConfig, account_id: &str) -> Result<Account, Error> {
        validation::account_id(account_id)?;
        let now = self.now_ms();
        let guard = SignupGuard { account_id };
        let reason = Reason::new(HistoryKind::Signup, "Signup bonus");

        let result = self.transact(|tx| {
            grant_once(tx, &guard, now, |tx| {
                let code =
                    allocate_short_code(tx, &mut rand::thread_rng(), cfg.short_code_attempts)?;
                let account = Account {
                    id: account_id.to_string(),
                    points: 0,
                    balance: Money::ZERO,
                    total_earned: 0,
                    tasks_completed: 0,
                    referred_by: None,
                    short_code: code.clone(),
                    last_checkin: None,
                    history_seq: 0,
                    created_at_ms: now,
                };
                save_account(tx, &account)?;
                tx.set(&keys::short_code(&code), &account_id)?;
                ledger::credit(tx, account_id, cfg.signup_bonus, Money::ZERO, &reason, now)
            })
        });
        METRICS.record_grant(&result);
        let account = result?;

        info!(account = %account_id, code = %account.short_code, "Account registered");
        self.emit(LedgerEvent::AccountRegistered {
            account_id: account.id.clone(),
            short_code: account.short_code.clone(),
            bonus: cfg.signup_bonus,
        });
        Ok(account)
    }

    pub fn account(&self, account_id: &str) -> Result<Account, Error> {
        validation::account_id(account_id)?;
        self.store()
            .get(&keys::account(account_id))?
            .ok_or_else(|| Error::account_not_found(account_id))
    }

    /// Resolve a short code to its account.
    pub fn account_by_code(&self, code: &str) -> Result<Account, Error> {
        let code = ShortCode::parse(code).map_err(|_| Error::InvalidCode)?;
        let account_id: String = self
            .store()
            .get(&keys::short_code(&code))?
            .ok_or_else(|| Error::NotFound(format!("short code {code}")))?;
        self.account(&account_id)
    }

    /// Ledger lines in append order. Kept after the account is deleted.
    pub fn history(&self, account_id: &str) -> Result<Vec<HistoryEntry>, Error> {
        validation::account_id(account_id)?;
        self.store().list_as(&keys::history_prefix(account_id))
    }

    /// Remove an account and its short-code mapping. History is kept and the
    /// id is retired, so it cannot be registered again.
    pub fn delete_account(
        &self,
        cfg: &RewardConfig,
        moderator: &str,
        account_id: &str,
    ) -> Result<Account, Error> {
        validation::account_id(account_id)?;
        cfg.require_moderator(moderator)?;

        let now = self.now_ms();
        let account = self.transact(|tx| {
            let account = load_account(tx, account_id)?;
            tx.delete(&keys::account(account_id));
            tx.delete(&keys::short_code(&account.short_code));
            tx.set(
                &keys::deleted_account(account_id),
                &DeletedAccount {
                    id: account_id.to_string(),
                    last_history_seq: account.history_seq,
                    deleted_by: moderator.to_string(),
                    deleted_at_ms: now,
                },
            )?;
            Ok(account)
        })?;

        info!(account = %account_id, moderator = %moderator, "Account deleted");
        self.emit(LedgerEvent::AccountDeleted {
            account_id: account_id.to_string(),
            moderator: moderator.to_string(),
        });
        Ok(account)
    }
}
