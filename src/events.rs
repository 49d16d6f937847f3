use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::points::Points;
use crate::types::{BorrowId, BorrowStatus, BorrowerId, CopyId};

/// all events emitted by the lending engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // lifecycle events
    BorrowRequested {
        borrow_id: BorrowId,
        copy_id: CopyId,
        borrower_id: BorrowerId,
        deposit: Points,
        timestamp: DateTime<Utc>,
    },
    BorrowConfirmed {
        borrow_id: BorrowId,
        due_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    BorrowExtended {
        borrow_id: BorrowId,
        new_due_at: DateTime<Utc>,
        extension_count: u32,
        timestamp: DateTime<Utc>,
    },
    BorrowReturned {
        borrow_id: BorrowId,
        was_overdue: bool,
        timestamp: DateTime<Utc>,
    },
    RequestCancelled {
        borrow_id: BorrowId,
        timestamp: DateTime<Utc>,
    },

    // point settlement events
    DepositCharged {
        correlation_id: String,
        amount: Points,
        timestamp: DateTime<Utc>,
    },
    DepositRefunded {
        borrow_id: BorrowId,
        amount: Points,
        timestamp: DateTime<Utc>,
    },

    // reconciler events
    BorrowMarkedOverdue {
        borrow_id: BorrowId,
        due_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    StaleRequestCancelled {
        borrow_id: BorrowId,
        requested_at: DateTime<Utc>,
        refunded: Points,
        timestamp: DateTime<Utc>,
    },
    ReconcilerRunCompleted {
        marked_overdue: u32,
        cancelled: u32,
        refund_failures: u32,
        timestamp: DateTime<Utc>,
    },

    // status change events
    StatusChanged {
        borrow_id: BorrowId,
        old_status: BorrowStatus,
        new_status: BorrowStatus,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
