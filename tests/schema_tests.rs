// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use finbot::commands::{stocks, transactions, users};
use finbot::config::Settings;
use finbot::migrations::{self, MIGRATIONS, MigrationOutcome};
use finbot::models::TradeType;
use finbot::utils::{is_constraint_violation, parse_date};
use finbot::db;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn migrated() -> Connection {
    let mut conn = db::open_in_memory().unwrap();
    migrations::migrate(&mut conn).unwrap();
    conn
}

fn settings_in(dir: &TempDir) -> Settings {
    Settings {
        database_path: dir.path().join("data").join("finbot.sqlite"),
        log_filter: "info".into(),
    }
}

#[test]
fn initial_migration_on_empty_database() {
    let mut conn = db::open_in_memory().unwrap();
    let m = MIGRATIONS[0];
    let outcome = migrations::apply_migration(&mut conn, m.version, m.description, m.sql).unwrap();
    assert_eq!(outcome, MigrationOutcome::Applied);

    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
        .unwrap();
    let tables: Vec<String> = stmt
        .query_map([], |r| r.get(0))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert_eq!(tables, vec!["schema_version", "stock", "transaction", "users"]);

    let (version, applied_at, description): (u32, String, String) = conn
        .query_row(
            "SELECT version, applied_at, description FROM schema_version",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .unwrap();
    assert_eq!(version, 1);
    assert!(!applied_at.is_empty());
    assert_eq!(description, "Initial schema creation");
}

#[test]
fn rerunning_migrations_on_existing_file_is_safe() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);

    let conn = db::open_or_init(&settings).unwrap();
    users::add_user(&conn, "Alice").unwrap();
    drop(conn);

    for _ in 0..3 {
        let mut conn = db::open_or_init(&settings).unwrap();
        let steps = migrations::migrate(&mut conn).unwrap();
        assert!(
            steps
                .iter()
                .all(|s| s.outcome == MigrationOutcome::AlreadyApplied)
        );
    }

    let conn = db::open(&settings.database_path).unwrap();
    let v1: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM schema_version WHERE version=1",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(v1, 1);
    let users: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
        .unwrap();
    assert_eq!(users, 1);
}

#[test]
fn concurrent_runners_apply_each_migration_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shared.sqlite");
    drop(db::open(&path).unwrap());

    let runners = 8;
    let barrier = Arc::new(Barrier::new(runners));
    let handles: Vec<_> = (0..runners)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut conn = db::open(&path).unwrap();
                barrier.wait();
                migrations::migrate(&mut conn)
            })
        })
        .collect();

    let mut applied = vec![0usize; MIGRATIONS.len()];
    for h in handles {
        let steps = h.join().unwrap().unwrap();
        assert_eq!(steps.len(), MIGRATIONS.len());
        for (i, step) in steps.iter().enumerate() {
            assert_eq!(step.version, MIGRATIONS[i].version);
            if step.outcome == MigrationOutcome::Applied {
                applied[i] += 1;
            }
        }
    }
    assert_eq!(applied, vec![1; MIGRATIONS.len()]);

    let conn = db::open(&path).unwrap();
    for m in MIGRATIONS {
        let rows: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM schema_version WHERE version=?1",
                params![m.version],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(rows, 1, "version {}", m.version);
    }
}

#[test]
fn duplicate_symbol_is_a_constraint_violation() {
    let conn = migrated();
    stocks::add_stock(&conn, "AAPL", Some("Apple Inc"), None).unwrap();
    let err = stocks::add_stock(&conn, " aapl ", None, None).unwrap_err();
    assert!(is_constraint_violation(&err));
}

#[test]
fn transaction_requires_existing_user_and_stock() {
    let conn = migrated();
    let user = users::add_user(&conn, "Alice").unwrap();
    let stock = stocks::add_stock(&conn, "AAPL", None, None).unwrap();
    let date = parse_date("2024-07-01").unwrap();

    let bad_user =
        transactions::NewTransaction::new(user + 100, stock, date, TradeType::Buy, dec("1"), dec("1"), dec("0"))
            .unwrap();
    let err = transactions::insert_transaction(&conn, &bad_user).unwrap_err();
    assert!(is_constraint_violation(&err));

    let bad_stock =
        transactions::NewTransaction::new(user, stock + 100, date, TradeType::Buy, dec("1"), dec("1"), dec("0"))
            .unwrap();
    let err = transactions::insert_transaction(&conn, &bad_stock).unwrap_err();
    assert!(is_constraint_violation(&err));
}

#[test]
fn transaction_type_is_checked_by_the_store() {
    let conn = migrated();
    let user = users::add_user(&conn, "Alice").unwrap();
    let stock = stocks::add_stock(&conn, "AAPL", None, None).unwrap();
    let res = conn.execute(
        r#"INSERT INTO "transaction"(user_id, stock_id, date, type, units, price, value, fee, cost, fy)
           VALUES (?1, ?2, '2024-07-01', 'hold', '1', '1', '1', '0', '1', '2024-25')"#,
        params![user, stock],
    );
    let err = res.unwrap_err();
    assert_eq!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    );
}

#[test]
fn recorded_trade_is_retrievable_across_all_tables() {
    let conn = migrated();
    let alice = users::add_user(&conn, "Alice").unwrap();
    let aapl = stocks::add_stock(&conn, "AAPL", Some("Apple Inc"), None).unwrap();
    let t = transactions::NewTransaction::new(
        alice,
        aapl,
        parse_date("2024-07-01").unwrap(),
        TradeType::Buy,
        dec("10"),
        dec("150.00"),
        dec("5.00"),
    )
    .unwrap()
    .with_fy("2024-25")
    .unwrap();
    let id = transactions::insert_transaction(&conn, &t).unwrap();

    let row: (String, String, Option<String>, String, String, String, String, String, String, String, String) = conn
        .query_row(
            r#"SELECT u.name, s.symbol, s.name, t.date, t.type, t.units, t.price, t.value, t.fee, t.cost, t.fy
               FROM "transaction" t JOIN users u ON t.user_id=u.id JOIN stock s ON t.stock_id=s.id
               WHERE t.id=?1"#,
            params![id],
            |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                    r.get(6)?,
                    r.get(7)?,
                    r.get(8)?,
                    r.get(9)?,
                    r.get(10)?,
                ))
            },
        )
        .unwrap();
    assert_eq!(row.0, "Alice");
    assert_eq!(row.1, "AAPL");
    assert_eq!(row.2.as_deref(), Some("Apple Inc"));
    assert_eq!(row.3, "2024-07-01");
    assert_eq!(row.4, "buy");
    assert_eq!(dec(&row.5), dec("10"));
    assert_eq!(dec(&row.6), dec("150.00"));
    assert_eq!(dec(&row.7), dec("1500.00"));
    assert_eq!(dec(&row.8), dec("5.00"));
    assert_eq!(dec(&row.9), dec("1505.00"));
    assert_eq!(row.10, "2024-25");

    let stored = transactions::get_transaction(&conn, id).unwrap();
    assert_eq!(stored.r#type, TradeType::Buy);
    assert_eq!(stored.cost, dec("1505"));
}
