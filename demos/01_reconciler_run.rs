/// reconciler - overdue flagging and stale-request cancellation with refunds
use borrow_lifecycle_rs::{
    BorrowStore, DailySchedule, InMemoryBorrowStore, InMemoryLockStore, InMemoryPointLedger,
    LendingConfig, LendingService, OverdueReconciler, Points, SafeTimeProvider, TimeSource, Uuid,
};
use chrono::{Duration, TimeZone, Utc};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== reconciler run ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();

    let config = LendingConfig::standard();
    let locks = InMemoryLockStore::new();
    let ledger = InMemoryPointLedger::new();
    let store = InMemoryBorrowStore::new();
    let mut service = LendingService::new(config.clone(), &locks, &ledger)?;

    // a loan that will go overdue
    let loaned = service.request_borrow(
        &store,
        Uuid::new_v4(),
        Uuid::new_v4(),
        Points::from_major(5_000),
        "trace-loan",
        &time,
    )?;
    service.confirm_request(&store, loaned, true, &time)?;
    println!("loaned copy, due {}", store.get(loaned)?.due_at.unwrap().format("%Y-%m-%d"));

    // a request the lender never confirms
    let ignored = service.request_borrow(
        &store,
        Uuid::new_v4(),
        Uuid::new_v4(),
        Points::from_major(10_000),
        "trace-ignored",
        &time,
    )?;
    println!("unconfirmed request placed, deposit 10000\n");

    // the host timer fires at each daily boundary
    let schedule = DailySchedule::midnight();
    let mut reconciler = OverdueReconciler::new(config, &locks, &ledger);
    let mut last_run = None;

    for day in 1..=15 {
        controller.advance(Duration::days(1));
        let now = time.now();

        if schedule.is_due(last_run, now) {
            let report = reconciler.run(&store, &time)?;
            last_run = Some(now);

            if report.marked_overdue > 0 || report.cancelled > 0 {
                println!("day {:2}: {:?}", day, report);
            }
        }
    }

    println!("\nfinal states:");
    println!("  loaned copy: {:?}", store.get(loaned)?.status);
    println!("  ignored request: {:?}", store.get(ignored)?.status);

    println!("\nledger transactions:");
    for txn in ledger.applied() {
        println!("  {:?} {} ({})", txn.txn_type, txn.amount, txn.correlation_id);
    }

    Ok(())
}
