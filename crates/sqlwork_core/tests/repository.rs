mod common;

use chrono::Utc;
use common::{committed_rows, schema_db, LedgerEntry, Order, RUNAWAY_CONDITION};
use rusqlite::types::Value;
use sqlwork_core::{
    CancelSignal, CommandKind, Repository, SqliteUnitOfWork, UnitOfWork, UowError,
};
use std::thread;
use std::time::Duration;

fn seeded(path: &str) -> SqliteUnitOfWork {
    let uow = SqliteUnitOfWork::open(path).unwrap();
    let orders = uow.repository::<Order>();
    for (customer, total) in [("ada", 120), ("grace", 80), ("linus", 45), ("ada", 300)] {
        orders.insert(&mut Order::new(customer, total)).unwrap();
    }
    uow
}

#[test]
fn insert_copies_generated_identity_and_stamps_created_at() {
    let (_dir, path) = schema_db();
    let uow = SqliteUnitOfWork::open(path.as_str()).unwrap();
    let orders = uow.repository::<Order>();

    let started = Utc::now();
    let mut first = Order::new("ada", 120);
    let identity = orders.insert(&mut first).unwrap();
    let finished = Utc::now();

    assert!(identity > 0);
    assert_eq!(first.id, identity);
    assert!(first.audit.created_at >= started && first.audit.created_at <= finished);
    assert!(first.audit.updated_at.is_none());

    let mut second = Order::new("grace", 80);
    assert_eq!(orders.insert(&mut second).unwrap(), identity + 1);

    let loaded = orders.get(&first).unwrap().unwrap();
    assert_eq!(loaded, first);
}

#[test]
fn insert_without_generated_identity_returns_zero() {
    let (_dir, path) = schema_db();
    let uow = SqliteUnitOfWork::open(path.as_str()).unwrap();
    let ledger = uow.repository::<LedgerEntry>();

    let mut entry = LedgerEntry::new("inv-7", "refund", -20);
    assert_eq!(ledger.insert(&mut entry).unwrap(), 0);
    assert_eq!(entry.code, "inv-7");
    assert_eq!(ledger.get(&entry).unwrap(), Some(entry));
}

#[test]
fn insert_rejects_oversized_actor_before_writing() {
    let (_dir, path) = schema_db();
    let uow = SqliteUnitOfWork::open(path.as_str()).unwrap();
    let orders = uow.repository::<Order>();

    let mut order = Order::new("ada", 120);
    order.audit.created_by = "x".repeat(37);
    let untouched = order.clone();
    assert!(matches!(
        orders.insert(&mut order),
        Err(UowError::Validation(_))
    ));
    assert_eq!(order, untouched);
    assert_eq!(orders.count(|_| {}).unwrap(), 0);
}

#[test]
fn failed_update_leaves_entity_untouched() {
    let (_dir, path) = schema_db();
    let uow = SqliteUnitOfWork::open(path.as_str()).unwrap();
    let orders = uow.repository::<Order>();

    let mut order = Order::new("ada", 120);
    orders.insert(&mut order).unwrap();

    order.total = -5;
    let attempted = order.clone();
    assert!(matches!(
        orders.update(&mut order),
        Err(UowError::Database(_))
    ));
    assert_eq!(order, attempted);
    assert!(order.audit.updated_at.is_none());

    // A constraint failure undoes only the statement.
    assert_eq!(orders.get(&order).unwrap().unwrap().total, 120);
}

#[test]
fn insert_that_writes_no_row_reports_no_identity() {
    let (_dir, path) = schema_db();
    let uow = SqliteUnitOfWork::open(path.as_str()).unwrap();
    let orders = uow.repository::<Order>();

    orders.insert(&mut Order::new("ada", 120)).unwrap();
    orders
        .execute(
            "CREATE TEMP TRIGGER skip_empty_orders BEFORE INSERT ON orders
             WHEN NEW.total = 0 BEGIN SELECT RAISE(IGNORE); END",
            &[],
            CommandKind::Text,
        )
        .unwrap();

    let mut skipped = Order::new("grace", 0);
    assert_eq!(orders.insert(&mut skipped).unwrap(), 0);
    assert_eq!(skipped.id, 0);
    assert_eq!(orders.count(|_| {}).unwrap(), 1);
}

#[test]
fn update_stamps_updated_at_and_reports_missing_rows() {
    let (_dir, path) = schema_db();
    let uow = SqliteUnitOfWork::open(path.as_str()).unwrap();
    let orders = uow.repository::<Order>();

    let mut order = Order::new("ada", 120);
    orders.insert(&mut order).unwrap();
    let created_at = order.audit.created_at;

    order.total = 150;
    order.audit.updated_by = Some("clerk-02".to_string());
    let started = Utc::now();
    assert!(orders.update(&mut order).unwrap());
    let updated_at = order.audit.updated_at.unwrap();
    assert!(updated_at >= started && updated_at <= Utc::now());

    let loaded = orders.get(&order).unwrap().unwrap();
    assert_eq!(loaded.total, 150);
    assert_eq!(loaded.audit.created_at, created_at);
    assert_eq!(loaded.audit.updated_by.as_deref(), Some("clerk-02"));

    let mut ghost = Order::new("nobody", 1);
    ghost.id = 9_999;
    assert!(!orders.update(&mut ghost).unwrap());

    // A no-match update leaves the transaction usable.
    orders.insert(&mut Order::new("grace", 80)).unwrap();
    uow.commit().unwrap();
    assert_eq!(committed_rows(&path, "orders"), 2);
}

#[test]
fn delete_requires_deletable_entity() {
    let (_dir, path) = schema_db();
    let uow = SqliteUnitOfWork::open(path.as_str()).unwrap();
    let ledger = uow.repository::<LedgerEntry>();
    let orders = uow.repository::<Order>();

    let mut entry = LedgerEntry::new("inv-1", "payment", 120);
    ledger.insert(&mut entry).unwrap();
    let err = ledger.delete(&entry).unwrap_err();
    assert!(matches!(
        err,
        UowError::UnsupportedOperation {
            entity: "LedgerEntry",
            operation: "delete"
        }
    ));
    assert_eq!(ledger.get_all().unwrap().len(), 1);

    let mut order = Order::new("ada", 120);
    orders.insert(&mut order).unwrap();
    assert!(orders.delete(&order).unwrap());
    assert!(!orders.delete(&order).unwrap());
    assert!(orders.get(&order).unwrap().is_none());
}

#[test]
fn delete_is_refused_even_after_dispose() {
    let (_dir, path) = schema_db();
    let uow = SqliteUnitOfWork::open(path.as_str()).unwrap();
    let ledger = uow.repository::<LedgerEntry>();
    uow.dispose();

    let entry = LedgerEntry::new("inv-1", "payment", 120);
    assert!(matches!(
        ledger.delete(&entry),
        Err(UowError::UnsupportedOperation { .. })
    ));
}

#[test]
fn find_filters_orders_and_pages() {
    let (_dir, path) = schema_db();
    let uow = seeded(&path);
    let orders = uow.repository::<Order>();

    let ada = orders
        .find(|options| {
            options
                .where_clause("\"customer\" = ?", vec![Value::Text("ada".to_string())])
                .order_by("\"total\" DESC");
        })
        .unwrap();
    assert_eq!(
        ada.iter().map(|order| order.total).collect::<Vec<_>>(),
        vec![300, 120]
    );

    let page = orders
        .find(|options| {
            options.order_by("\"total\"").top(2).skip(1);
        })
        .unwrap();
    assert_eq!(
        page.iter().map(|order| order.total).collect::<Vec<_>>(),
        vec![80, 120]
    );

    assert_eq!(orders.get_all().unwrap().len(), 4);
}

#[test]
fn count_honours_conditions() {
    let (_dir, path) = schema_db();
    let uow = seeded(&path);
    let orders = uow.repository::<Order>();

    assert_eq!(orders.count(|_| {}).unwrap(), 4);
    let large = orders
        .count(|options| {
            options.where_clause("\"total\" >= ?", vec![Value::Integer(100)]);
        })
        .unwrap();
    assert_eq!(large, 2);
}

#[test]
fn bulk_update_overwrites_every_matching_row() {
    let (_dir, path) = schema_db();
    let uow = seeded(&path);
    let orders = uow.repository::<Order>();

    let template = Order::new("merged", 0);
    let changed = orders
        .bulk_update(&template, |options| {
            options.where_clause("\"customer\" = ?", vec![Value::Text("ada".to_string())]);
        })
        .unwrap();
    assert_eq!(changed, 2);

    let merged = orders
        .count(|options| {
            options.where_clause(
                "\"customer\" = ? AND \"total\" = ?",
                vec![Value::Text("merged".to_string()), Value::Integer(0)],
            );
        })
        .unwrap();
    assert_eq!(merged, 2);

    let everything = orders.bulk_update(&template, |_| {}).unwrap();
    assert_eq!(everything, 4);
}

#[test]
fn stale_transaction_attachment_is_superseded() {
    let (_dir, path) = schema_db();
    let uow = seeded(&path);
    let orders = uow.repository::<Order>();

    let stale = uow.transaction_id().unwrap();
    uow.commit().unwrap();
    assert_ne!(uow.transaction_id(), Some(stale));

    let found = orders
        .find(|options| {
            options.attach_to_transaction(stale);
        })
        .unwrap();
    assert_eq!(found.len(), 4);

    let counted = orders
        .count(|options| {
            options.attach_to_transaction(stale);
        })
        .unwrap();
    assert_eq!(counted, 4);
}

#[test]
fn raw_statements_run_inside_the_unit_of_work() {
    let (_dir, path) = schema_db();
    let uow = seeded(&path);
    let orders = uow.repository::<Order>();

    let changed = orders
        .execute(
            "UPDATE orders SET total = total + ? WHERE customer = ?",
            &[Value::Integer(1), Value::Text("grace".to_string())],
            CommandKind::Text,
        )
        .unwrap();
    assert_eq!(changed, 1);

    let grace = orders
        .query(
            "SELECT * FROM orders WHERE customer = ?",
            &[Value::Text("grace".to_string())],
            CommandKind::Text,
        )
        .unwrap();
    assert_eq!(grace.len(), 1);
    assert_eq!(grace[0].total, 81);

    let totals = orders
        .query_scalar_int(
            "SELECT total FROM orders ORDER BY total",
            &[],
            CommandKind::Text,
        )
        .unwrap();
    assert_eq!(totals, vec![45, 81, 120, 300]);

    assert_eq!(committed_rows(&path, "orders"), 0);
}

#[test]
fn stored_procedures_are_unsupported_on_sqlite() {
    let (_dir, path) = schema_db();
    let uow = SqliteUnitOfWork::open(path.as_str()).unwrap();
    let orders = uow.repository::<Order>();

    let err = orders
        .execute("archive_orders", &[], CommandKind::StoredProcedure)
        .unwrap_err();
    assert!(matches!(
        err,
        UowError::UnsupportedOperation {
            entity: "sqlite",
            operation: "stored procedures"
        }
    ));
}

#[test]
fn timeout_interrupts_statement_and_keeps_unit_usable() {
    let (_dir, path) = schema_db();
    let uow = seeded(&path);
    let orders = uow.repository::<Order>();

    let err = orders
        .count(|options| {
            options
                .where_clause(RUNAWAY_CONDITION, Vec::new())
                .with_timeout(Duration::from_millis(50));
        })
        .unwrap_err();
    assert!(matches!(err, UowError::Timeout(_)));

    assert!(uow.transaction_id().is_some());
    orders.insert(&mut Order::new("grace", 80)).unwrap();
    uow.commit().unwrap();
}

#[test]
fn timed_out_write_reports_rolled_back_transaction() {
    let (_dir, path) = schema_db();
    let uow = SqliteUnitOfWork::open(path.as_str()).unwrap();
    let orders = uow.repository::<Order>();
    orders.insert(&mut Order::new("ada", 120)).unwrap();
    let before = uow.transaction_id().unwrap();

    let err = orders
        .bulk_update(&Order::new("merged", 0), |options| {
            options
                .where_clause(RUNAWAY_CONDITION, Vec::new())
                .with_timeout(Duration::from_millis(50));
        })
        .unwrap_err();
    match err {
        UowError::TransactionRolledBack { cause } => {
            assert!(matches!(*cause, UowError::Timeout(_)))
        }
        other => panic!("expected rolled back transaction, got {other:?}"),
    }

    // The earlier insert went with the transaction; a new one is live.
    assert!(uow.transaction_id().unwrap() > before);
    assert_eq!(orders.count(|_| {}).unwrap(), 0);
    orders.insert(&mut Order::new("grace", 80)).unwrap();
    uow.commit().unwrap();
    assert_eq!(committed_rows(&path, "orders"), 1);
}

#[test]
fn cancelled_write_reports_rolled_back_transaction() {
    let (_dir, path) = schema_db();
    let uow = seeded(&path);
    let signal = CancelSignal::new();
    let orders = uow.repository::<Order>().with_cancel(&signal);

    let canceller = {
        let signal = signal.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            signal.cancel();
        })
    };
    let err = orders
        .execute(
            &format!("DELETE FROM orders WHERE {RUNAWAY_CONDITION}"),
            &[],
            CommandKind::Text,
        )
        .unwrap_err();
    canceller.join().unwrap();

    assert!(matches!(
        err,
        UowError::TransactionRolledBack { cause } if matches!(*cause, UowError::Cancelled)
    ));
    assert_eq!(uow.repository::<Order>().count(|_| {}).unwrap(), 0);
}

#[test]
fn cancel_signal_interrupts_in_flight_statement() {
    let (_dir, path) = schema_db();
    let uow = seeded(&path);
    let signal = CancelSignal::new();
    let orders = uow.repository::<Order>().with_cancel(&signal);

    let canceller = {
        let signal = signal.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            signal.cancel();
        })
    };
    let err = orders
        .count(|options| {
            options.where_clause(RUNAWAY_CONDITION, Vec::new());
        })
        .unwrap_err();
    canceller.join().unwrap();
    assert!(matches!(err, UowError::Cancelled));

    // A cancelled signal fails later calls up front; other handles are unaffected.
    assert!(matches!(orders.get_all(), Err(UowError::Cancelled)));
    assert_eq!(uow.repository::<Order>().get_all().unwrap().len(), 4);
}
