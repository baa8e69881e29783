use anyhow::Result;
use earnhub_engine::clock::ManualClock;
use earnhub_engine::events::RecordingSink;
use earnhub_engine::model::{Account, HistoryKind};
use earnhub_engine::store::MemoryStore;
use earnhub_engine::{Engine, Reason, RewardConfig, StoreConfig};
use earnhub_types::Money;
use std::sync::Arc;

/// 2024-03-01T12:00:00Z
pub const START_MS: u64 = 1_709_294_400_000;

pub const MODERATOR: &str = "mod";

pub struct Setup {
    pub engine: Engine,
    pub clock: Arc<ManualClock>,
    pub events: Arc<RecordingSink>,
    pub cfg: RewardConfig,
}

pub fn default_rewards() -> RewardConfig {
    RewardConfig {
        moderators: vec![MODERATOR.into()],
        ..RewardConfig::default()
    }
}

pub fn setup_engine() -> Setup {
    setup_engine_with(default_rewards(), StoreConfig::default())
}

/// Engine tuned for contention tests: enough attempts that every racer
/// either commits or fails with a domain error.
pub fn setup_contended() -> Setup {
    setup_engine_with(default_rewards(), StoreConfig { max_attempts: 128 })
}

pub fn setup_engine_with(cfg: RewardConfig, store: StoreConfig) -> Setup {
    let clock = Arc::new(ManualClock::new(START_MS));
    let events = Arc::new(RecordingSink::default());
    let engine = Engine::new(
        Arc::new(MemoryStore::new(&store)),
        clock.clone(),
        events.clone(),
    );
    Setup {
        engine,
        clock,
        events,
        cfg,
    }
}

impl Setup {
    pub fn register(&self, id: &str) -> Result<Account> {
        Ok(self.engine.register(&self.cfg, id)?)
    }

    /// Register `id` and adjust it to exactly `points`.
    pub fn funded(&self, id: &str, points: u64) -> Result<Account> {
        let account = self.register(id)?;
        let reason = Reason::new(HistoryKind::Adjustment, "Test funding");
        let account = if points >= account.points {
            self.engine
                .credit(id, points - account.points, Money::ZERO, reason)?
        } else {
            self.engine
                .debit(id, account.points - points, Money::ZERO, reason)?
        };
        Ok(account)
    }

    /// History deltas sum to the current points and balance.
    pub fn assert_reconciles(&self, id: &str) -> Result<()> {
        let account = self.engine.account(id)?;
        let history = self.engine.history(id)?;
        let points: i64 = history.iter().map(|e| e.points_delta).sum();
        let money: i64 = history.iter().map(|e| e.money_delta).sum();
        assert_eq!(points, account.points as i64, "points of {id}");
        assert_eq!(money, account.balance.units() as i64, "balance of {id}");
        assert_eq!(history.len() as u64, account.history_seq, "entries of {id}");
        Ok(())
    }
}

/// Bitwise CRC-16/CCITT-FALSE, kept separate from the codec under test.
pub fn reference_crc(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        for bit in (0..8).rev() {
            let input = (byte >> bit) & 1 == 1;
            let top = crc & 0x8000 != 0;
            crc <<= 1;
            if input != top {
                crc ^= 0x1021;
            }
        }
    }
    crc
}
