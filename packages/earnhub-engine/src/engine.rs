//! The engine handle: store, clock, and event sink shared by every operation.
//!
//! Operations live in their own modules as `impl Engine` blocks. Each one
//! validates input first, then runs exactly one store transaction, then emits
//! one event after the commit.

use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::events::{EventSink, LedgerEvent, LogSink};
use crate::store::{MemoryStore, Store, Transaction};
use crate::Error;
use earnhub_types::DayKey;
use std::sync::Arc;

#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, events: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            clock,
            events,
        }
    }

    /// In-process store, system clock, events logged.
    pub fn in_memory(config: &StoreConfig) -> Self {
        Self::new(
            Arc::new(MemoryStore::new(config)),
            Arc::new(SystemClock),
            Arc::new(LogSink),
        )
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub(crate) fn today(&self) -> Result<DayKey, Error> {
        Ok(DayKey::from_timestamp_ms(self.now_ms())?)
    }

    pub(crate) fn transact<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnMut(&mut Transaction<'_>) -> Result<T, Error>,
    {
        self.store.run_transaction(f)
    }

    pub(crate) fn emit(&self, event: LedgerEvent) {
        self.events.emit(&event);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::RewardConfig;
    use crate::events::RecordingSink;
    use crate::ledger::Reason;
    use crate::model::{Account, HistoryKind};
    use earnhub_types::Money;

    /// 2024-03-01T12:00:00Z
    pub(crate) const START_MS: u64 = 1_709_294_400_000;

    pub(crate) struct Harness {
        pub engine: Engine,
        pub clock: Arc<ManualClock>,
        pub sink: Arc<RecordingSink>,
        pub cfg: RewardConfig,
    }

    pub(crate) fn setup_engine() -> Harness {
        setup_engine_with(RewardConfig {
            moderators: vec!["mod".into()],
            ..RewardConfig::default()
        })
    }

    pub(crate) fn setup_engine_with(cfg: RewardConfig) -> Harness {
        let clock = Arc::new(ManualClock::new(START_MS));
        let sink = Arc::new(RecordingSink::default());
        let engine = Engine::new(
            Arc::new(MemoryStore::default()),
            clock.clone(),
            sink.clone(),
        );
        Harness {
            engine,
            clock,
            sink,
            cfg,
        }
    }

    impl Harness {
        pub(crate) fn register(&self, id: &str) -> Account {
            self.engine.register(&self.cfg, id).unwrap()
        }

        /// Registered account topped up to exactly `points` points.
        pub(crate) fn funded(&self, id: &str, points: u64) -> Account {
            let account = self.register(id);
            let reason = Reason::new(HistoryKind::Adjustment, "Test funding");
            if points >= account.points {
                self.engine
                    .credit(id, points - account.points, Money::ZERO, reason)
                    .unwrap()
            } else {
                self.engine
                    .debit(id, account.points - points, Money::ZERO, reason)
                    .unwrap()
            }
        }
    }
}
