use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a borrow
pub type BorrowId = Uuid;

/// unique identifier for a physical copy of a book
pub type CopyId = Uuid;

/// unique identifier for a borrower
pub type BorrowerId = Uuid;

/// borrow status
///
/// OVERDUE is a flag state, not an exit: a loan can still be returned
/// from it. CANCELLED and RETURNED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BorrowStatus {
    /// requested by the borrower, deposit captured, awaiting lender confirmation
    Requested,
    /// confirmed and handed over, due date set
    Borrowed,
    /// loan period extended, new due date set
    Extended,
    /// due date passed without return
    Overdue,
    /// request cancelled (by the borrower or by the stale-request sweep)
    Cancelled,
    /// copy returned to the lender
    Returned,
}

impl BorrowStatus {
    /// check if no further transition is permitted
    pub fn is_terminal(&self) -> bool {
        matches!(self, BorrowStatus::Cancelled | BorrowStatus::Returned)
    }

    /// check if the copy is out with the borrower
    pub fn is_out_on_loan(&self) -> bool {
        matches!(
            self,
            BorrowStatus::Borrowed | BorrowStatus::Extended | BorrowStatus::Overdue
        )
    }
}

/// state machine transition, used in error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionEvent {
    Confirm,
    Extend,
    MarkOverdue,
    Cancel,
    Return,
}
