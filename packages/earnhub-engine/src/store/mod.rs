//! Durable-store contract consumed by the engine.
//!
//! Documents are JSON values under string keys. Multi-document changes go
//! through [`Store::run_transaction`]: reads record the version they observed,
//! writes are buffered, and commit validates the read set before applying
//! anything. A stale read set means the closure is re-run from scratch.

pub mod keys;
mod memory;

pub use memory::MemoryStore;

use crate::metrics::METRICS;
use crate::Error;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Key -> version observed by a transaction. Absent documents are version 0.
pub type ReadSet = BTreeMap<String, u64>;

/// Key -> new value, `None` deletes.
pub type WriteSet = BTreeMap<String, Option<Value>>;

/// A stored document with the store-wide version of its last write.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    pub version: u64,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { version: u64 },
    /// A document in the read set changed since it was read. Nothing applied.
    Conflict,
}

/// Emitted after every commit that wrote something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub version: u64,
    pub keys: Vec<String>,
}

/// Keyed document storage with serializable multi-key commits.
pub trait Store: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<Versioned>, Error>;

    /// Committed documents whose key starts with `prefix`, in key order.
    fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>, Error>;

    /// Validate `reads` and apply `writes` as one unit.
    fn commit(&self, reads: &ReadSet, writes: WriteSet) -> Result<CommitOutcome, Error>;

    /// Attempts `run_transaction` makes before giving up.
    fn max_attempts(&self) -> u32;

    /// Number of committed documents.
    fn document_count(&self) -> usize;

    /// Change feed for presentation layers. The engine never listens to it.
    fn subscribe(&self) -> broadcast::Receiver<ChangeNotice>;
}

impl dyn Store {
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        self.read(key)?
            .map(|doc| serde_json::from_value(doc.value).map_err(Error::from))
            .transpose()
    }

    /// Blind single-document write.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), Error> {
        let mut writes = WriteSet::new();
        writes.insert(key.to_string(), Some(serde_json::to_value(value)?));
        match self.commit(&ReadSet::new(), writes)? {
            CommitOutcome::Committed { .. } => Ok(()),
            CommitOutcome::Conflict => Err(Error::ConflictRetryFailed { attempts: 1 }),
        }
    }

    /// Atomic numeric increment of one field of one document.
    pub fn increment(&self, key: &str, field: &str, delta: i64) -> Result<i64, Error> {
        self.run_transaction(|tx| tx.increment(key, field, delta))
    }

    pub fn list_as<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, Error> {
        self.list(prefix)?
            .into_iter()
            .map(|(_, value)| serde_json::from_value(value).map_err(Error::from))
            .collect()
    }

    /// Run `f` inside an optimistic transaction, re-running it on conflict.
    ///
    /// An `Err` from `f` aborts immediately and discards its writes. The closure
    /// may run several times, so it must not have side effects outside `tx`.
    pub fn run_transaction<T, F>(&self, mut f: F) -> Result<T, Error>
    where
        F: FnMut(&mut Transaction<'_>) -> Result<T, Error>,
    {
        let attempts = self.max_attempts().max(1);
        for attempt in 1..=attempts {
            let mut tx = Transaction::new(self);
            let out = match f(&mut tx) {
                Ok(out) => out,
                Err(e) => {
                    METRICS.tx_aborted.fetch_add(1, Ordering::Relaxed);
                    return Err(e);
                }
            };
            let (reads, writes) = tx.into_parts();
            match self.commit(&reads, writes)? {
                CommitOutcome::Committed { version } => {
                    METRICS.tx_committed.fetch_add(1, Ordering::Relaxed);
                    debug!(version, attempt, "transaction committed");
                    return Ok(out);
                }
                CommitOutcome::Conflict => {
                    METRICS.tx_conflicts.fetch_add(1, Ordering::Relaxed);
                    debug!(attempt, "transaction conflict, re-running");
                }
            }
        }
        METRICS.tx_retries_exhausted.fetch_add(1, Ordering::Relaxed);
        warn!(attempts, "transaction gave up after repeated conflicts");
        Err(Error::ConflictRetryFailed { attempts })
    }
}

/// Transactional handle passed to [`Store::run_transaction`] closures.
///
/// Reads are repeatable within one attempt and see the attempt's own writes.
pub struct Transaction<'s> {
    store: &'s dyn Store,
    reads: ReadSet,
    snapshot: BTreeMap<String, Option<Value>>,
    writes: WriteSet,
}

impl<'s> Transaction<'s> {
    fn new(store: &'s dyn Store) -> Self {
        Self {
            store,
            reads: ReadSet::new(),
            snapshot: BTreeMap::new(),
            writes: WriteSet::new(),
        }
    }

    fn into_parts(self) -> (ReadSet, WriteSet) {
        (self.reads, self.writes)
    }

    fn load(&mut self, key: &str) -> Result<Option<Value>, Error> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(pending.clone());
        }
        if let Some(seen) = self.snapshot.get(key) {
            return Ok(seen.clone());
        }
        let doc = self.store.read(key)?;
        let (version, value) = match doc {
            Some(doc) => (doc.version, Some(doc.value)),
            None => (0, None),
        };
        self.reads.insert(key.to_string(), version);
        self.snapshot.insert(key.to_string(), value.clone());
        Ok(value)
    }

    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>, Error> {
        self.load(key)?
            .map(|v| serde_json::from_value(v).map_err(Error::from))
            .transpose()
    }

    pub fn exists(&mut self, key: &str) -> Result<bool, Error> {
        Ok(self.load(key)?.is_some())
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), Error> {
        self.writes
            .insert(key.to_string(), Some(serde_json::to_value(value)?));
        Ok(())
    }

    /// Read-modify-write of an existing document.
    pub fn update<T, F>(&mut self, key: &str, f: F) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T) -> Result<(), Error>,
    {
        let mut doc: T = self
            .get(key)?
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        f(&mut doc)?;
        self.set(key, &doc)?;
        Ok(doc)
    }

    /// Add `delta` to an integer field, creating the document and field at 0.
    pub fn increment(&mut self, key: &str, field: &str, delta: i64) -> Result<i64, Error> {
        let mut doc = self
            .load(key)?
            .unwrap_or_else(|| Value::Object(Default::default()));
        let obj = doc
            .as_object_mut()
            .ok_or_else(|| Error::Store(format!("{key} is not an object")))?;
        let current = match obj.get(field) {
            None | Some(Value::Null) => 0,
            Some(v) => v
                .as_i64()
                .ok_or_else(|| Error::Store(format!("{key}.{field} is not an integer")))?,
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| Error::Store(format!("{key}.{field} overflow")))?;
        obj.insert(field.to_string(), Value::from(next));
        self.writes.insert(key.to_string(), Some(doc));
        Ok(next)
    }

    pub fn delete(&mut self, key: &str) {
        self.writes.insert(key.to_string(), None);
    }
}
