//! In-process store with optimistic concurrency control.

use super::{ChangeNotice, CommitOutcome, ReadSet, Store, Versioned, WriteSet};
use crate::config::StoreConfig;
use crate::Error;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

const CHANGE_FEED_CAPACITY: usize = 1024;

#[derive(Default)]
struct State {
    docs: BTreeMap<String, Versioned>,
    /// Store-wide commit counter. Never reused, so a deleted-then-recreated
    /// document never matches a stale read.
    version: u64,
}

pub struct MemoryStore {
    state: RwLock<State>,
    max_attempts: u32,
    changes: broadcast::Sender<ChangeNotice>,
}

impl MemoryStore {
    pub fn new(config: &StoreConfig) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            state: RwLock::new(State::default()),
            max_attempts: config.max_attempts,
            changes,
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.read_state().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Latest committed version.
    pub fn version(&self) -> u64 {
        self.read_state().version
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl Store for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Versioned>, Error> {
        Ok(self.read_state().docs.get(key).cloned())
    }

    fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>, Error> {
        let state = self.read_state();
        Ok(state
            .docs
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, doc)| (k.clone(), doc.value.clone()))
            .collect())
    }

    fn commit(&self, reads: &ReadSet, writes: WriteSet) -> Result<CommitOutcome, Error> {
        let mut state = self.write_state();

        let stale = reads.iter().any(|(key, seen)| {
            let current = state.docs.get(key).map_or(0, |doc| doc.version);
            current != *seen
        });
        if stale {
            return Ok(CommitOutcome::Conflict);
        }
        if writes.is_empty() {
            return Ok(CommitOutcome::Committed {
                version: state.version,
            });
        }

        state.version += 1;
        let version = state.version;
        let keys: Vec<String> = writes.keys().cloned().collect();
        for (key, write) in writes {
            match write {
                Some(value) => {
                    state.docs.insert(key, Versioned { version, value });
                }
                None => {
                    state.docs.remove(&key);
                }
            }
        }
        drop(state);

        // No subscribers is the normal case for the engine.
        let _ = self.changes.send(ChangeNotice { version, keys });
        Ok(CommitOutcome::Committed { version })
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn document_count(&self) -> usize {
        self.len()
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.changes.subscribe()
    }
}
