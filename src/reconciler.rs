use hourglass_rs::SafeTimeProvider;
use tracing::{debug, warn};

use crate::config::LendingConfig;
use crate::errors::{LendingError, Result};
use crate::events::{Event, EventStore};
use crate::guard::IdempotencyGuard;
use crate::ledger::{PointLedgerPort, PointTransaction};
use crate::lock::LockStore;
use crate::store::BorrowStore;

/// key prefix for the stale-request compensating refund
pub const REFUND_LOCK_PREFIX: &str = "borrow-refund";

/// fixed token serializing reconciler runs across processes
pub const RUN_LOCK_KEY: &str = "reconciler:run";

/// per-run counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcilerReport {
    pub marked_overdue: u32,
    pub cancelled: u32,
    pub refund_failures: u32,
    pub conflicts: u32,
}

/// time-triggered batch process reconciling the borrow set with the
/// time-dependent rules: overdue flagging and stale-request cancellation
/// with compensating refund
///
/// both passes are idempotent against repeated runs. failures are
/// isolated per loan and left for the next scheduled run; only a lock
/// store outage aborts the run, because nothing can be guarded without it.
pub struct OverdueReconciler<'a> {
    config: LendingConfig,
    locks: &'a dyn LockStore,
    ledger: &'a dyn PointLedgerPort,
    pub events: EventStore,
}

impl<'a> OverdueReconciler<'a> {
    pub fn new(
        config: LendingConfig,
        locks: &'a dyn LockStore,
        ledger: &'a dyn PointLedgerPort,
    ) -> Self {
        Self {
            config,
            locks,
            ledger,
            events: EventStore::new(),
        }
    }

    /// run both sweeps once
    ///
    /// self-serializes on a fixed run lock; a second concurrent run sees
    /// `DuplicateRequest` and must simply wait for the next boundary.
    pub fn run(
        &mut self,
        store: &dyn BorrowStore,
        time_provider: &SafeTimeProvider,
    ) -> Result<ReconcilerReport> {
        let now = time_provider.now();

        let acquired = self
            .locks
            .try_acquire(RUN_LOCK_KEY, self.config.reconciler_lock_ttl(), now)?;
        if !acquired {
            return Err(LendingError::DuplicateRequest {
                key: RUN_LOCK_KEY.to_string(),
            });
        }

        let mut report = ReconcilerReport::default();
        self.sweep_overdue(store, time_provider, &mut report);
        self.sweep_stale_requests(store, time_provider, &mut report);

        self.events.emit(Event::ReconcilerRunCompleted {
            marked_overdue: report.marked_overdue,
            cancelled: report.cancelled,
            refund_failures: report.refund_failures,
            timestamp: time_provider.now(),
        });

        // the run lock is a mutex, not an idempotency key: release it so
        // the next scheduled boundary is not blocked by the ttl
        self.locks.release(RUN_LOCK_KEY)?;

        Ok(report)
    }

    /// pass 1: flag loans whose due date has passed
    ///
    /// pure status flip, no compensation; loans already overdue are
    /// excluded by the status filter, so a re-run is a no-op.
    fn sweep_overdue(
        &mut self,
        store: &dyn BorrowStore,
        time_provider: &SafeTimeProvider,
        report: &mut ReconcilerReport,
    ) {
        let now = time_provider.now();

        for mut borrow in store.due_loans(now) {
            let due_at = match borrow.due_at {
                Some(due) => due,
                None => continue,
            };

            if let Err(err) = borrow.mark_overdue(now) {
                warn!(borrow_id = %borrow.id, error = %err, "overdue transition rejected");
                continue;
            }

            match store.update(borrow.clone()) {
                Ok(()) => {
                    report.marked_overdue += 1;
                    self.events.emit(Event::BorrowMarkedOverdue {
                        borrow_id: borrow.id,
                        due_at,
                        timestamp: now,
                    });
                }
                Err(LendingError::StaleBorrow { id }) => {
                    // lost to a concurrent user transition, e.g. a return
                    debug!(borrow_id = %id, "overdue sweep lost concurrent update");
                    report.conflicts += 1;
                }
                Err(err) => {
                    warn!(borrow_id = %borrow.id, error = %err, "overdue update failed");
                    report.conflicts += 1;
                }
            }
        }
    }

    /// pass 2: cancel unconfirmed requests older than the grace period
    /// and refund the captured deposit
    ///
    /// policy: refund first, transition only on refund success. the
    /// refund is guarded by a lock keyed on the loan id, so a sweep
    /// retried after a mid-run crash cannot double-refund within the
    /// lock's ttl window.
    fn sweep_stale_requests(
        &mut self,
        store: &dyn BorrowStore,
        time_provider: &SafeTimeProvider,
        report: &mut ReconcilerReport,
    ) {
        let now = time_provider.now();
        let cutoff = now - self.config.request_grace();
        let guard = IdempotencyGuard::new(self.locks);

        for mut borrow in store.stale_requests(cutoff) {
            let token = borrow.id.to_string();
            let deposit = borrow.deposit;

            let mut scope = guard.begin();
            let guarded = guard.guarded_execute(
                &mut scope,
                REFUND_LOCK_PREFIX,
                &token,
                self.config.guard_lock_ttl(),
                now,
                || Ok(PointTransaction::refund(deposit, token.clone())),
            );

            match guarded {
                Ok(()) => {}
                Err(LendingError::DuplicateRequest { key }) => {
                    // refund already in flight or completed within the ttl window
                    debug!(borrow_id = %borrow.id, key = %key, "stale-request refund already guarded");
                    continue;
                }
                Err(err) => {
                    warn!(borrow_id = %borrow.id, error = %err, "refund guard failed");
                    report.refund_failures += 1;
                    continue;
                }
            }

            if let Err(err) = scope.commit(self.ledger) {
                // lock was compensated by the failed commit; retried next run
                warn!(borrow_id = %borrow.id, error = %err, "deposit refund failed");
                report.refund_failures += 1;
                continue;
            }

            if let Err(err) = borrow.cancel(now) {
                warn!(borrow_id = %borrow.id, error = %err, "stale cancel rejected");
                report.conflicts += 1;
                continue;
            }

            match store.update(borrow.clone()) {
                Ok(()) => {
                    report.cancelled += 1;
                    self.events.emit(Event::StaleRequestCancelled {
                        borrow_id: borrow.id,
                        requested_at: borrow.requested_at,
                        refunded: deposit,
                        timestamp: now,
                    });
                    self.events.emit(Event::DepositRefunded {
                        borrow_id: borrow.id,
                        amount: deposit,
                        timestamp: now,
                    });
                }
                Err(err) => {
                    // refund applied but the transition lost; the refund lock
                    // keeps a re-run from double-refunding within its ttl
                    warn!(borrow_id = %borrow.id, error = %err, "stale cancel update failed");
                    report.conflicts += 1;
                }
            }
        }
    }
}
