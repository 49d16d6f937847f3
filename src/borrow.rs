use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::LendingConfig;
use crate::errors::{LendingError, Result};
use crate::points::Points;
use crate::types::{BorrowId, BorrowStatus, BorrowerId, CopyId, TransitionEvent};

/// a single loan of one physical copy
///
/// status and timestamps are mutated only through the transition methods;
/// every transition validates its guard, stamps the relevant timestamp
/// and bumps the version used for optimistic concurrency in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Borrow {
    pub id: BorrowId,
    pub copy_id: CopyId,
    pub borrower_id: BorrowerId,
    pub status: BorrowStatus,
    pub requested_at: DateTime<Utc>,
    pub borrowed_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    /// deposit captured at request time, refunded on cancel or return
    pub deposit: Points,
    pub extension_count: u32,
    /// bumped by every transition; the store rejects stale writes
    pub version: u64,
}

impl Borrow {
    /// create a new request with the deposit captured
    pub fn request(
        copy_id: CopyId,
        borrower_id: BorrowerId,
        deposit: Points,
        requested_at: DateTime<Utc>,
    ) -> Result<Self> {
        if !deposit.is_positive() {
            return Err(LendingError::InvalidDepositAmount { amount: deposit });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            copy_id,
            borrower_id,
            status: BorrowStatus::Requested,
            requested_at,
            borrowed_at: None,
            due_at: None,
            returned_at: None,
            deposit,
            extension_count: 0,
            version: 0,
        })
    }

    /// lender confirms the request and hands the copy over
    pub fn confirm(&mut self, config: &LendingConfig, now: DateTime<Utc>) -> Result<()> {
        self.require(BorrowStatus::Requested, TransitionEvent::Confirm)?;

        self.status = BorrowStatus::Borrowed;
        self.borrowed_at = Some(now);
        self.due_at = Some(now + config.loan_period());
        self.version += 1;

        Ok(())
    }

    /// extend the loan period
    pub fn extend(&mut self, config: &LendingConfig, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        if !matches!(self.status, BorrowStatus::Borrowed | BorrowStatus::Extended) {
            return Err(self.invalid(TransitionEvent::Extend));
        }
        if self.extension_count >= config.max_extensions {
            return Err(LendingError::ExtensionLimitReached {
                count: self.extension_count,
                max: config.max_extensions,
            });
        }

        let base = self.due_at.unwrap_or(now);
        let new_due = base + config.extension_period();

        self.status = BorrowStatus::Extended;
        self.due_at = Some(new_due);
        self.extension_count += 1;
        self.version += 1;

        Ok(new_due)
    }

    /// flag the loan as overdue once the due date has passed
    ///
    /// reconciler-driven: the status filter in the sweep keeps the
    /// operation idempotent, and the guard here keeps it honest.
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !matches!(self.status, BorrowStatus::Borrowed | BorrowStatus::Extended) {
            return Err(self.invalid(TransitionEvent::MarkOverdue));
        }
        let due_at = self.due_at.ok_or_else(|| self.invalid(TransitionEvent::MarkOverdue))?;
        if due_at >= now {
            return Err(self.invalid(TransitionEvent::MarkOverdue));
        }

        self.status = BorrowStatus::Overdue;
        self.version += 1;

        Ok(())
    }

    /// cancel an unconfirmed request
    pub fn cancel(&mut self, _now: DateTime<Utc>) -> Result<()> {
        self.require(BorrowStatus::Requested, TransitionEvent::Cancel)?;

        self.status = BorrowStatus::Cancelled;
        self.version += 1;

        Ok(())
    }

    /// record the copy's return; allowed from overdue as well
    pub fn mark_returned(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.status.is_out_on_loan() {
            return Err(self.invalid(TransitionEvent::Return));
        }

        self.status = BorrowStatus::Returned;
        self.returned_at = Some(now);
        self.version += 1;

        Ok(())
    }

    /// check whether the due date lies strictly before `now`
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at.map(|due| due < now).unwrap_or(false)
    }

    fn require(&self, expected: BorrowStatus, event: TransitionEvent) -> Result<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(self.invalid(event))
        }
    }

    fn invalid(&self, event: TransitionEvent) -> LendingError {
        LendingError::InvalidStateTransition {
            current: self.status,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn config() -> LendingConfig {
        LendingConfig::standard()
    }

    fn at_epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn requested(now: DateTime<Utc>) -> Borrow {
        Borrow::request(Uuid::new_v4(), Uuid::new_v4(), Points::from_major(10_000), now).unwrap()
    }

    #[test]
    fn test_request_rejects_nonpositive_deposit() {
        let err = Borrow::request(Uuid::new_v4(), Uuid::new_v4(), Points::ZERO, at_epoch());
        assert!(matches!(err, Err(LendingError::InvalidDepositAmount { .. })));
    }

    #[test]
    fn test_confirm_sets_due_date_and_bumps_version() {
        let now = at_epoch();
        let mut borrow = requested(now);

        borrow.confirm(&config(), now).unwrap();

        assert_eq!(borrow.status, BorrowStatus::Borrowed);
        assert_eq!(borrow.borrowed_at, Some(now));
        assert_eq!(borrow.due_at, Some(now + Duration::days(14)));
        assert_eq!(borrow.version, 1);
    }

    #[test]
    fn test_extend_pushes_due_date_from_previous_due() {
        let now = at_epoch();
        let mut borrow = requested(now);
        borrow.confirm(&config(), now).unwrap();

        let new_due = borrow.extend(&config(), now + Duration::days(10)).unwrap();

        assert_eq!(borrow.status, BorrowStatus::Extended);
        assert_eq!(new_due, now + Duration::days(21));
        assert_eq!(borrow.extension_count, 1);
    }

    #[test]
    fn test_extension_limit() {
        let now = at_epoch();
        let mut borrow = requested(now);
        borrow.confirm(&config(), now).unwrap();
        borrow.extend(&config(), now).unwrap();

        let err = borrow.extend(&config(), now).unwrap_err();
        assert!(matches!(err, LendingError::ExtensionLimitReached { count: 1, max: 1 }));
    }

    #[test]
    fn test_mark_overdue_requires_past_due_date() {
        let now = at_epoch();
        let mut borrow = requested(now);
        borrow.confirm(&config(), now).unwrap();

        // due date in the future
        assert!(borrow.mark_overdue(now + Duration::days(7)).is_err());
        assert_eq!(borrow.status, BorrowStatus::Borrowed);

        // strictly past the due date
        borrow.mark_overdue(now + Duration::days(15)).unwrap();
        assert_eq!(borrow.status, BorrowStatus::Overdue);
    }

    #[test]
    fn test_return_allowed_from_overdue() {
        let now = at_epoch();
        let mut borrow = requested(now);
        borrow.confirm(&config(), now).unwrap();
        borrow.mark_overdue(now + Duration::days(15)).unwrap();

        borrow.mark_returned(now + Duration::days(16)).unwrap();

        assert_eq!(borrow.status, BorrowStatus::Returned);
        assert_eq!(borrow.returned_at, Some(now + Duration::days(16)));
    }

    #[test]
    fn test_terminal_states_reject_all_transitions() {
        let now = at_epoch();

        let mut cancelled = requested(now);
        cancelled.cancel(now).unwrap();
        assert!(matches!(
            cancelled.mark_returned(now),
            Err(LendingError::InvalidStateTransition {
                current: BorrowStatus::Cancelled,
                event: TransitionEvent::Return,
            })
        ));
        assert!(cancelled.confirm(&config(), now).is_err());
        assert!(cancelled.cancel(now).is_err());

        let mut returned = requested(now);
        returned.confirm(&config(), now).unwrap();
        returned.mark_returned(now).unwrap();
        assert!(matches!(
            returned.mark_returned(now),
            Err(LendingError::InvalidStateTransition {
                current: BorrowStatus::Returned,
                event: TransitionEvent::Return,
            })
        ));
        assert!(returned.extend(&config(), now).is_err());
    }

    #[test]
    fn test_cancel_only_from_requested() {
        let now = at_epoch();
        let mut borrow = requested(now);
        borrow.confirm(&config(), now).unwrap();

        assert!(borrow.cancel(now).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let now = at_epoch();
        let mut borrow = requested(now);
        borrow.confirm(&config(), now).unwrap();

        let json = serde_json::to_string(&borrow).unwrap();
        let restored: Borrow = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, borrow);
    }
}
