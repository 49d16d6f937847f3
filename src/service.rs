use hourglass_rs::SafeTimeProvider;

use crate::borrow::Borrow;
use crate::config::LendingConfig;
use crate::errors::{LendingError, Result};
use crate::events::{Event, EventStore};
use crate::guard::IdempotencyGuard;
use crate::ledger::{PointLedgerPort, PointTransaction};
use crate::lock::LockStore;
use crate::points::Points;
use crate::store::BorrowStore;
use crate::types::{BorrowId, BorrowStatus, BorrowerId, CopyId};

/// key prefix for the deposit charge at request time
pub const CHARGE_LOCK_PREFIX: &str = "borrow-request";

/// key prefix for refunds issued on user cancel and on return
pub const RELEASE_LOCK_PREFIX: &str = "borrow-release";

/// interactive lending operations
///
/// every point movement goes through the idempotency guard; a duplicate
/// surfaces synchronously to the caller as "already processing" and must
/// not be retried blindly.
pub struct LendingService<'a> {
    config: LendingConfig,
    locks: &'a dyn LockStore,
    ledger: &'a dyn PointLedgerPort,
    pub events: EventStore,
}

impl<'a> LendingService<'a> {
    pub fn new(
        config: LendingConfig,
        locks: &'a dyn LockStore,
        ledger: &'a dyn PointLedgerPort,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            locks,
            ledger,
            events: EventStore::new(),
        })
    }

    /// place a borrow request, charging the deposit
    ///
    /// `request_token` is the caller's correlation token; a client retry
    /// of the same logical request carries the same token and collides on
    /// the same lock key.
    pub fn request_borrow(
        &mut self,
        store: &dyn BorrowStore,
        copy_id: CopyId,
        borrower_id: BorrowerId,
        deposit: Points,
        request_token: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<BorrowId> {
        let now = time_provider.now();
        let guard = IdempotencyGuard::new(self.locks);

        let mut scope = guard.begin();
        guard.guarded_execute(
            &mut scope,
            CHARGE_LOCK_PREFIX,
            request_token,
            self.config.guard_lock_ttl(),
            now,
            || {
                if !deposit.is_positive() {
                    return Err(LendingError::InvalidDepositAmount { amount: deposit });
                }
                Ok(PointTransaction::use_points(deposit, request_token.to_string()))
            },
        )?;

        let borrow = Borrow::request(copy_id, borrower_id, deposit, now)?;
        let borrow_id = borrow.id;

        // charge commits first; if it fails the scope compensates and the
        // request is never persisted
        scope.commit(self.ledger)?;
        store.insert(borrow)?;

        self.events.emit(Event::DepositCharged {
            correlation_id: request_token.to_string(),
            amount: deposit,
            timestamp: now,
        });
        self.events.emit(Event::BorrowRequested {
            borrow_id,
            copy_id,
            borrower_id,
            deposit,
            timestamp: now,
        });

        Ok(borrow_id)
    }

    /// lender confirms the request
    pub fn confirm_request(
        &mut self,
        store: &dyn BorrowStore,
        borrow_id: BorrowId,
        copy_available: bool,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        if !copy_available {
            return Err(LendingError::CopyUnavailable);
        }

        let now = time_provider.now();
        let mut borrow = store.get(borrow_id)?;
        borrow.confirm(&self.config, now)?;
        let due_at = borrow.due_at.unwrap_or(now);
        store.update(borrow)?;

        self.events.emit(Event::BorrowConfirmed {
            borrow_id,
            due_at,
            timestamp: now,
        });
        self.events.emit(Event::StatusChanged {
            borrow_id,
            old_status: BorrowStatus::Requested,
            new_status: BorrowStatus::Borrowed,
            timestamp: now,
        });

        Ok(())
    }

    /// extend the loan period
    pub fn extend_loan(
        &mut self,
        store: &dyn BorrowStore,
        borrow_id: BorrowId,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let now = time_provider.now();
        let mut borrow = store.get(borrow_id)?;
        let new_due_at = borrow.extend(&self.config, now)?;
        let extension_count = borrow.extension_count;
        store.update(borrow)?;

        self.events.emit(Event::BorrowExtended {
            borrow_id,
            new_due_at,
            extension_count,
            timestamp: now,
        });

        Ok(())
    }

    /// record the return of the copy and refund the deposit
    ///
    /// refund first, transition only on refund success: the same ordering
    /// the reconciler uses for compensating refunds.
    pub fn return_loan(
        &mut self,
        store: &dyn BorrowStore,
        borrow_id: BorrowId,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let now = time_provider.now();
        let mut borrow = store.get(borrow_id)?;

        if !borrow.status.is_out_on_loan() {
            // validate before touching the ledger so terminal loans fail
            // with a state error, not a duplicate-refund error
            return borrow.mark_returned(now);
        }

        let was_overdue = borrow.status == BorrowStatus::Overdue;
        let deposit = borrow.deposit;
        let token = borrow_id.to_string();

        let guard = IdempotencyGuard::new(self.locks);
        let mut scope = guard.begin();
        guard.guarded_execute(
            &mut scope,
            RELEASE_LOCK_PREFIX,
            &token,
            self.config.guard_lock_ttl(),
            now,
            || Ok(PointTransaction::refund(deposit, token.clone())),
        )?;
        scope.commit(self.ledger)?;

        borrow.mark_returned(now)?;
        store.update(borrow)?;

        self.events.emit(Event::BorrowReturned {
            borrow_id,
            was_overdue,
            timestamp: now,
        });
        self.events.emit(Event::DepositRefunded {
            borrow_id,
            amount: deposit,
            timestamp: now,
        });

        Ok(())
    }

    /// borrower cancels an unconfirmed request; the deposit is refunded
    pub fn cancel_request(
        &mut self,
        store: &dyn BorrowStore,
        borrow_id: BorrowId,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let now = time_provider.now();
        let mut borrow = store.get(borrow_id)?;

        if borrow.status != BorrowStatus::Requested {
            return borrow.cancel(now);
        }

        let deposit = borrow.deposit;
        let token = borrow_id.to_string();

        let guard = IdempotencyGuard::new(self.locks);
        let mut scope = guard.begin();
        guard.guarded_execute(
            &mut scope,
            RELEASE_LOCK_PREFIX,
            &token,
            self.config.guard_lock_ttl(),
            now,
            || Ok(PointTransaction::refund(deposit, token.clone())),
        )?;
        scope.commit(self.ledger)?;

        borrow.cancel(now)?;
        store.update(borrow)?;

        self.events.emit(Event::RequestCancelled {
            borrow_id,
            timestamp: now,
        });
        self.events.emit(Event::DepositRefunded {
            borrow_id,
            amount: deposit,
            timestamp: now,
        });

        Ok(())
    }
}
