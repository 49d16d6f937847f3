use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::errors::Result;
use crate::points::Points;

/// point transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointTransactionType {
    Charge,
    Use,
    Exchange,
    Refund,
}

/// a transaction against the point ledger
///
/// the correlation id ties the transaction to the idempotency key that
/// guarded it; repeated applies with the same correlation id must be safe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointTransaction {
    pub amount: Points,
    pub txn_type: PointTransactionType,
    pub correlation_id: String,
}

impl PointTransaction {
    pub fn new(amount: Points, txn_type: PointTransactionType, correlation_id: String) -> Self {
        Self {
            amount,
            txn_type,
            correlation_id,
        }
    }

    /// deposit capture at request time
    pub fn use_points(amount: Points, correlation_id: String) -> Self {
        Self::new(amount, PointTransactionType::Use, correlation_id)
    }

    /// compensating refund of a captured deposit
    pub fn refund(amount: Points, correlation_id: String) -> Self {
        Self::new(amount, PointTransactionType::Refund, correlation_id)
    }
}

/// abstract interface to the point/wallet subsystem
///
/// implemented by the host platform; this crate only requires that a
/// REFUND increases the borrower's available balance by the amount and
/// that repeated calls with the same correlation id are safe.
pub trait PointLedgerPort: Send + Sync {
    fn apply(&self, transaction: &PointTransaction) -> Result<()>;
}

/// in-memory ledger for tests and demos
///
/// idempotent per (correlation id, type): a replayed transaction is
/// accepted but recorded only once.
#[derive(Debug, Default)]
pub struct InMemoryPointLedger {
    applied: Mutex<Vec<PointTransaction>>,
}

impl InMemoryPointLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// all transactions recorded so far
    pub fn applied(&self) -> Vec<PointTransaction> {
        self.applied.lock().unwrap().clone()
    }

    /// transactions recorded for a given correlation id
    pub fn applied_for(&self, correlation_id: &str) -> Vec<PointTransaction> {
        self.applied
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.correlation_id == correlation_id)
            .cloned()
            .collect()
    }
}

impl PointLedgerPort for InMemoryPointLedger {
    fn apply(&self, transaction: &PointTransaction) -> Result<()> {
        let mut applied = self.applied.lock().unwrap();

        let replay = applied.iter().any(|t| {
            t.correlation_id == transaction.correlation_id && t.txn_type == transaction.txn_type
        });
        if !replay {
            applied.push(transaction.clone());
        }

        Ok(())
    }
}
