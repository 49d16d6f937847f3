use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::errors::Result;

/// distributed mutual-exclusion primitive
///
/// the presence of a key is the sole source of truth for "operation in
/// flight". acquisition must be a single atomic set-if-absent, never a
/// check followed by a set. every acquire carries a ttl so a process
/// that dies holding a lock cannot poison its key forever.
pub trait LockStore: Send + Sync {
    /// atomically create the key only if absent (or expired), true on success
    fn try_acquire(&self, key: &str, ttl: Duration, now: DateTime<Utc>) -> Result<bool>;

    /// idempotent delete, no error if the key is absent
    fn release(&self, key: &str) -> Result<()>;
}

/// shared in-memory lock table with the same atomicity contract as an
/// external store: the sharded entry api holds the shard lock across the
/// check and the insert, so concurrent acquirers cannot both observe
/// "absent".
#[derive(Debug, Default)]
pub struct InMemoryLockStore {
    expirations: DashMap<String, DateTime<Utc>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// check whether a live (unexpired) lock is held for the key
    pub fn is_held(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.expirations
            .get(key)
            .map(|expiry| *expiry > now)
            .unwrap_or(false)
    }
}

impl LockStore for InMemoryLockStore {
    fn try_acquire(&self, key: &str, ttl: Duration, now: DateTime<Utc>) -> Result<bool> {
        match self.expirations.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() <= now {
                    // expired lock, reclaim
                    occupied.insert(now + ttl);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now + ttl);
                Ok(true)
            }
        }
    }

    fn release(&self, key: &str) -> Result<()> {
        self.expirations.remove(key);
        Ok(())
    }
}
