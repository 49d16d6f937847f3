pub mod borrow;
pub mod config;
pub mod errors;
pub mod events;
pub mod guard;
pub mod ledger;
pub mod lock;
pub mod points;
pub mod reconciler;
pub mod schedule;
pub mod service;
pub mod store;
pub mod txn;
pub mod types;

// re-export key types
pub use borrow::Borrow;
pub use config::LendingConfig;
pub use errors::{LendingError, Result};
pub use events::{Event, EventStore};
pub use guard::{lock_key, IdempotencyGuard};
pub use ledger::{
    InMemoryPointLedger, PointLedgerPort, PointTransaction, PointTransactionType,
};
pub use lock::{InMemoryLockStore, LockStore};
pub use points::Points;
pub use reconciler::{OverdueReconciler, ReconcilerReport};
pub use schedule::DailySchedule;
pub use service::LendingService;
pub use store::{BorrowStore, InMemoryBorrowStore};
pub use txn::TransactionScope;
pub use types::{BorrowId, BorrowStatus, BorrowerId, CopyId, TransitionEvent};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
