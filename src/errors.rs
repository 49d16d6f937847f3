use thiserror::Error;

use crate::points::Points;
use crate::types::{BorrowId, BorrowStatus, TransitionEvent};

#[derive(Error, Debug)]
pub enum LendingError {
    #[error("duplicate request: lock already held for {key}")]
    DuplicateRequest {
        key: String,
    },

    #[error("invalid state transition: {event:?} not allowed from {current:?}")]
    InvalidStateTransition {
        current: BorrowStatus,
        event: TransitionEvent,
    },

    #[error("ledger apply failure: {message}")]
    LedgerApplyFailure {
        message: String,
    },

    #[error("lock store unavailable: {message}")]
    LockStoreUnavailable {
        message: String,
    },

    #[error("extension limit reached: {count} of {max} used")]
    ExtensionLimitReached {
        count: u32,
        max: u32,
    },

    #[error("copy not available for lending")]
    CopyUnavailable,

    #[error("borrow not found: {id}")]
    BorrowNotFound {
        id: BorrowId,
    },

    #[error("stale borrow: {id} was modified concurrently")]
    StaleBorrow {
        id: BorrowId,
    },

    #[error("borrow already exists: {id}")]
    DuplicateBorrow {
        id: BorrowId,
    },

    #[error("invalid deposit amount: {amount}")]
    InvalidDepositAmount {
        amount: Points,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, LendingError>;
