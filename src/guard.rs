use chrono::{DateTime, Duration, Utc};

use crate::errors::{LendingError, Result};
use crate::ledger::PointTransaction;
use crate::lock::LockStore;
use crate::txn::TransactionScope;

/// build the idempotency key for a guarded operation
///
/// retries of the same logical request must supply the same prefix and
/// correlation token so they collide on the same key.
pub fn lock_key(prefix: &str, correlation_token: &str) -> String {
    format!("{}:{}", prefix, correlation_token)
}

/// wraps side-effecting operations so that concurrent or retried
/// invocations with the same correlation token execute at most once
///
/// the guard acquires the lock, then lets the operation produce a ledger
/// effect which is deferred into the transaction scope; the effect only
/// happens when the scope commits, and the scope's rollback path removes
/// the lock. a failed acquire means the operation is already in flight
/// (or completed within the ttl window) and must not be retried blindly.
pub struct IdempotencyGuard<'a> {
    locks: &'a dyn LockStore,
}

impl<'a> IdempotencyGuard<'a> {
    pub fn new(locks: &'a dyn LockStore) -> Self {
        Self { locks }
    }

    /// open a transactional boundary for guarded effects
    pub fn begin(&self) -> TransactionScope<'a> {
        TransactionScope::begin(self.locks)
    }

    /// acquire the lock and defer the produced effect into the scope
    ///
    /// exactly one lock key is created per successful call, and zero or
    /// one effect is deferred.
    pub fn guarded_execute<F>(
        &self,
        scope: &mut TransactionScope<'a>,
        prefix: &str,
        correlation_token: &str,
        ttl: Duration,
        now: DateTime<Utc>,
        operation: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Result<PointTransaction>,
    {
        let key = lock_key(prefix, correlation_token);

        // fail closed: a lock store error must not be mistaken for "absent"
        let acquired = self.locks.try_acquire(&key, ttl, now)?;
        if !acquired {
            return Err(LendingError::DuplicateRequest { key });
        }

        // register before running the operation so an operation error
        // rolls the acquisition back with the scope
        scope.hold_lock(key);

        let transaction = operation()?;
        scope.defer(transaction);

        Ok(())
    }
}
