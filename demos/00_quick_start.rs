/// quick start - request, confirm and return a borrow with an idempotent deposit
use borrow_lifecycle_rs::{
    BorrowStore, InMemoryBorrowStore, InMemoryLockStore, InMemoryPointLedger, LendingConfig,
    LendingService, Points, SafeTimeProvider, TimeSource, Uuid,
};
use chrono::{Duration, TimeZone, Utc};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== quick start ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();

    let locks = InMemoryLockStore::new();
    let ledger = InMemoryPointLedger::new();
    let store = InMemoryBorrowStore::new();
    let mut service = LendingService::new(LendingConfig::standard(), &locks, &ledger)?;

    // 1. borrower requests a copy, deposit charged through the guard
    let borrow_id = service.request_borrow(
        &store,
        Uuid::new_v4(),
        Uuid::new_v4(),
        Points::from_major(10_000),
        "trace-0001",
        &time,
    )?;
    println!("requested: {}", borrow_id);
    println!("  status: {:?}", store.get(borrow_id)?.status);

    // a client retry with the same trace id collides on the lock
    let retry = service.request_borrow(
        &store,
        Uuid::new_v4(),
        Uuid::new_v4(),
        Points::from_major(10_000),
        "trace-0001",
        &time,
    );
    println!("  retry with same token: {}", retry.unwrap_err());

    // 2. lender confirms, 14-day due date set
    service.confirm_request(&store, borrow_id, true, &time)?;
    let borrow = store.get(borrow_id)?;
    println!("\nconfirmed");
    println!("  status: {:?}", borrow.status);
    println!("  due at: {}", borrow.due_at.unwrap().format("%Y-%m-%d"));

    // 3. borrower extends once
    controller.advance(Duration::days(10));
    service.extend_loan(&store, borrow_id, &time)?;
    let borrow = store.get(borrow_id)?;
    println!("\nextended");
    println!("  status: {:?}", borrow.status);
    println!("  due at: {}", borrow.due_at.unwrap().format("%Y-%m-%d"));

    // 4. return, deposit refunded
    controller.advance(Duration::days(8));
    service.return_loan(&store, borrow_id, &time)?;
    println!("\nreturned");
    println!("  status: {:?}", store.get(borrow_id)?.status);

    println!("\nledger transactions:");
    for txn in ledger.applied() {
        println!("  {:?} {} ({})", txn.txn_type, txn.amount, txn.correlation_id);
    }

    Ok(())
}
