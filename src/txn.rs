use tracing::warn;

use crate::errors::{LendingError, Result};
use crate::ledger::{PointLedgerPort, PointTransaction};
use crate::lock::LockStore;

/// transactional boundary for guarded operations
///
/// ledger effects produced under an idempotency lock are not executed
/// directly; they are deferred into this scope and applied only on
/// `commit`. the lock and the business transaction live in different
/// failure domains, so the scope also carries the compensation rule:
/// rollback (explicit, or implicit via drop without commit) releases the
/// held lock keys so a legitimate retry can acquire them again. commit
/// keeps the locks; within the ttl window an identical correlation token
/// is treated as a replay and rejected.
///
/// if the process dies before either path runs, ttl expiry is the
/// recovery bound.
pub struct TransactionScope<'a> {
    locks: &'a dyn LockStore,
    held_keys: Vec<String>,
    pending: Vec<PointTransaction>,
    settled: bool,
}

impl<'a> TransactionScope<'a> {
    pub fn begin(locks: &'a dyn LockStore) -> Self {
        Self {
            locks,
            held_keys: Vec::new(),
            pending: Vec::new(),
            settled: false,
        }
    }

    /// record a lock key to compensate on rollback
    pub(crate) fn hold_lock(&mut self, key: String) {
        self.held_keys.push(key);
    }

    /// defer a ledger effect until commit
    pub(crate) fn defer(&mut self, transaction: PointTransaction) {
        self.pending.push(transaction);
    }

    /// effects waiting for commit
    pub fn pending(&self) -> &[PointTransaction] {
        &self.pending
    }

    /// apply all deferred effects through the ledger port
    ///
    /// held locks are deliberately not released on success. if an apply
    /// fails the scope compensates (locks released) and the failure is
    /// surfaced, so the whole boundary either takes effect or leaves the
    /// correlation token retryable.
    pub fn commit(mut self, ledger: &dyn PointLedgerPort) -> Result<Vec<PointTransaction>> {
        let pending = std::mem::take(&mut self.pending);

        for transaction in &pending {
            if let Err(err) = ledger.apply(transaction) {
                self.release_held();
                self.settled = true;
                return Err(LendingError::LedgerApplyFailure {
                    message: format!(
                        "apply of {:?} for {} failed: {}",
                        transaction.txn_type, transaction.correlation_id, err
                    ),
                });
            }
        }

        self.settled = true;
        Ok(pending)
    }

    /// discard deferred effects and release held locks
    pub fn rollback(mut self) {
        self.pending.clear();
        self.release_held();
        self.settled = true;
    }

    fn release_held(&mut self) {
        for key in self.held_keys.drain(..) {
            if let Err(err) = self.locks.release(&key) {
                // best effort: ttl expiry is the fallback recovery
                warn!(key = %key, error = %err, "failed to release lock on rollback");
            }
        }
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.pending.clear();
            self.release_held();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LendingError;
    use crate::ledger::InMemoryPointLedger;
    use crate::lock::InMemoryLockStore;
    use crate::points::Points;
    use chrono::{Duration, TimeZone, Utc};

    struct FailingLedger;

    impl PointLedgerPort for FailingLedger {
        fn apply(&self, _transaction: &PointTransaction) -> Result<()> {
            Err(LendingError::LedgerApplyFailure {
                message: "wallet service down".to_string(),
            })
        }
    }

    #[test]
    fn test_commit_applies_effects_and_keeps_locks() {
        let locks = InMemoryLockStore::new();
        let ledger = InMemoryPointLedger::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        locks.try_acquire("refund:loan-1", Duration::minutes(10), now).unwrap();

        let mut scope = TransactionScope::begin(&locks);
        scope.hold_lock("refund:loan-1".to_string());
        scope.defer(PointTransaction::refund(Points::from_major(10_000), "loan-1".to_string()));

        let applied = scope.commit(&ledger).unwrap();

        assert_eq!(applied.len(), 1);
        assert_eq!(ledger.applied_for("loan-1").len(), 1);
        // replay protection: the key stays held within the ttl window
        assert!(locks.is_held("refund:loan-1", now));
    }

    #[test]
    fn test_rollback_releases_locks_and_drops_effects() {
        let locks = InMemoryLockStore::new();
        let ledger = InMemoryPointLedger::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        locks.try_acquire("refund:loan-2", Duration::minutes(10), now).unwrap();

        let mut scope = TransactionScope::begin(&locks);
        scope.hold_lock("refund:loan-2".to_string());
        scope.defer(PointTransaction::refund(Points::from_major(500), "loan-2".to_string()));
        scope.rollback();

        assert!(ledger.applied().is_empty());
        assert!(!locks.is_held("refund:loan-2", now));
        // a legitimate retry can acquire again
        assert!(locks.try_acquire("refund:loan-2", Duration::minutes(10), now).unwrap());
    }

    #[test]
    fn test_drop_without_commit_compensates() {
        let locks = InMemoryLockStore::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        locks.try_acquire("charge:req-9", Duration::minutes(10), now).unwrap();

        {
            let mut scope = TransactionScope::begin(&locks);
            scope.hold_lock("charge:req-9".to_string());
            // scope dropped mid-operation, e.g. an error propagated
        }

        assert!(!locks.is_held("charge:req-9", now));
    }

    #[test]
    fn test_failed_apply_rolls_back_atomically() {
        let locks = InMemoryLockStore::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        locks.try_acquire("refund:loan-3", Duration::minutes(10), now).unwrap();

        let mut scope = TransactionScope::begin(&locks);
        scope.hold_lock("refund:loan-3".to_string());
        scope.defer(PointTransaction::refund(Points::from_major(100), "loan-3".to_string()));

        let err = scope.commit(&FailingLedger).unwrap_err();
        assert!(matches!(err, LendingError::LedgerApplyFailure { .. }));

        // lock released, so the next scheduled run can retry
        assert!(!locks.is_held("refund:loan-3", now));
    }
}
