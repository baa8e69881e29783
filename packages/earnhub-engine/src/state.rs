//! Application state shared across handlers.

use crate::config::{Config, RewardConfig};
use crate::engine::Engine;
use crate::Error;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::info;

/// Shared application state.
pub struct AppState {
    pub engine: Engine,
    rewards: RwLock<Arc<RewardConfig>>,
    pub start_time: Instant,
    pub request_count: AtomicU64,
}

impl AppState {
    /// Build state over an in-process store.
    pub fn new(config: &Config) -> Result<Self, Error> {
        Self::with_engine(Engine::in_memory(&config.store), config.rewards.clone())
    }

    pub fn with_engine(engine: Engine, rewards: RewardConfig) -> Result<Self, Error> {
        rewards.validate()?;
        Ok(Self {
            engine,
            rewards: RwLock::new(Arc::new(rewards)),
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
        })
    }

    /// Current reward snapshot. Callers keep it for the whole operation.
    pub fn rewards(&self) -> Arc<RewardConfig> {
        self.rewards
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Swap in `next` as the active snapshot, one version past the current one.
    /// Only a moderator of the current snapshot may do this.
    pub fn replace_rewards(
        &self,
        moderator: &str,
        next: RewardConfig,
    ) -> Result<Arc<RewardConfig>, Error> {
        next.validate()?;
        let mut slot = self.rewards.write().unwrap_or_else(|e| e.into_inner());
        slot.require_moderator(moderator)?;
        let snapshot = Arc::new(slot.succeeded_by(next));
        *slot = Arc::clone(&snapshot);
        drop(slot);

        info!(version = snapshot.version, moderator = %moderator, "Reward config replaced");
        Ok(snapshot)
    }

    /// Run a synchronous engine call on the blocking pool with the current
    /// snapshot.
    pub async fn run<T, F>(&self, f: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&Engine, &RewardConfig) -> Result<T, Error> + Send + 'static,
    {
        let engine = self.engine.clone();
        let rewards = self.rewards();
        tokio::task::spawn_blocking(move || f(&engine, &rewards))
            .await
            .map_err(|e| Error::Internal(format!("engine task failed: {e}")))?
    }
}
