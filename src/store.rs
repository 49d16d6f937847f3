use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::borrow::Borrow;
use crate::errors::{LendingError, Result};
use crate::types::{BorrowId, BorrowStatus};

/// abstract transactional store for the persisted borrow set
///
/// `update` enforces optimistic concurrency: a write carrying a version
/// that is not exactly one ahead of the stored one is rejected, so two
/// mutually exclusive transitions on the same loan can never both land.
pub trait BorrowStore: Send + Sync {
    fn insert(&self, borrow: Borrow) -> Result<()>;

    fn get(&self, id: BorrowId) -> Result<Borrow>;

    fn update(&self, borrow: Borrow) -> Result<()>;

    /// loans out on loan (BORROWED or EXTENDED) with a due date strictly before `now`
    fn due_loans(&self, now: DateTime<Utc>) -> Vec<Borrow>;

    /// unconfirmed requests placed strictly before `cutoff`
    fn stale_requests(&self, cutoff: DateTime<Utc>) -> Vec<Borrow>;
}

/// in-memory borrow store with the same contract as the platform's
/// relational store
#[derive(Debug, Default)]
pub struct InMemoryBorrowStore {
    borrows: DashMap<BorrowId, Borrow>,
}

impl InMemoryBorrowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.borrows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.borrows.is_empty()
    }
}

impl BorrowStore for InMemoryBorrowStore {
    fn insert(&self, borrow: Borrow) -> Result<()> {
        match self.borrows.entry(borrow.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(LendingError::DuplicateBorrow { id: borrow.id })
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(borrow);
                Ok(())
            }
        }
    }

    fn get(&self, id: BorrowId) -> Result<Borrow> {
        self.borrows
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or(LendingError::BorrowNotFound { id })
    }

    fn update(&self, borrow: Borrow) -> Result<()> {
        let mut entry = self
            .borrows
            .get_mut(&borrow.id)
            .ok_or(LendingError::BorrowNotFound { id: borrow.id })?;

        if borrow.version != entry.version + 1 {
            return Err(LendingError::StaleBorrow { id: borrow.id });
        }

        *entry = borrow;
        Ok(())
    }

    fn due_loans(&self, now: DateTime<Utc>) -> Vec<Borrow> {
        self.borrows
            .iter()
            .filter(|entry| {
                matches!(entry.status, BorrowStatus::Borrowed | BorrowStatus::Extended)
                    && entry.is_past_due(now)
            })
            .map(|entry| entry.clone())
            .collect()
    }

    fn stale_requests(&self, cutoff: DateTime<Utc>) -> Vec<Borrow> {
        self.borrows
            .iter()
            .filter(|entry| {
                entry.status == BorrowStatus::Requested && entry.requested_at < cutoff
            })
            .map(|entry| entry.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LendingConfig;
    use crate::points::Points;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn at_epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn requested(now: DateTime<Utc>) -> Borrow {
        Borrow::request(Uuid::new_v4(), Uuid::new_v4(), Points::from_major(10_000), now).unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let store = InMemoryBorrowStore::new();
        let borrow = requested(at_epoch());
        let id = borrow.id;

        store.insert(borrow.clone()).unwrap();

        assert_eq!(store.get(id).unwrap(), borrow);
        assert!(matches!(
            store.insert(borrow),
            Err(LendingError::DuplicateBorrow { .. })
        ));
    }

    #[test]
    fn test_update_rejects_concurrent_transition() {
        let store = InMemoryBorrowStore::new();
        let config = LendingConfig::standard();
        let now = at_epoch();

        let borrow = requested(now);
        let id = borrow.id;
        store.insert(borrow).unwrap();

        // two actors load the same version
        let mut user_copy = store.get(id).unwrap();
        let mut reconciler_copy = store.get(id).unwrap();

        user_copy.confirm(&config, now).unwrap();
        store.update(user_copy).unwrap();

        // the losing write is rejected, not silently applied
        reconciler_copy.cancel(now).unwrap();
        assert!(matches!(
            store.update(reconciler_copy),
            Err(LendingError::StaleBorrow { .. })
        ));
        assert_eq!(store.get(id).unwrap().status, BorrowStatus::Borrowed);
    }

    #[test]
    fn test_due_loans_filters_by_status_and_due_date() {
        let store = InMemoryBorrowStore::new();
        let config = LendingConfig::standard();
        let now = at_epoch();

        let mut due = requested(now);
        due.confirm(&config, now).unwrap();
        let due_id = due.id;
        store.insert(due).unwrap();

        let mut not_yet_due = requested(now);
        not_yet_due.confirm(&config, now + Duration::days(10)).unwrap();
        store.insert(not_yet_due).unwrap();

        let still_requested = requested(now);
        store.insert(still_requested).unwrap();

        let later = now + Duration::days(15);
        let selected = store.due_loans(later);

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, due_id);

        // exactly at the due date is not "strictly before now"
        assert!(store.due_loans(now + Duration::days(14)).is_empty());
    }

    #[test]
    fn test_stale_requests_cutoff_is_strict() {
        let store = InMemoryBorrowStore::new();
        let now = at_epoch();

        let old = requested(now - Duration::days(4));
        let old_id = old.id;
        store.insert(old).unwrap();

        let boundary = requested(now - Duration::days(3));
        store.insert(boundary).unwrap();

        let fresh = requested(now);
        store.insert(fresh).unwrap();

        let cutoff = now - Duration::days(3);
        let stale = store.stale_requests(cutoff);

        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, old_id);
    }
}
