// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use finbot::commands::{stocks, transactions, users};
use finbot::{cli, db, migrations};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::str::FromStr;

fn setup() -> Connection {
    let mut conn = db::open_in_memory().unwrap();
    migrations::migrate(&mut conn).unwrap();
    users::add_user(&conn, "Alice").unwrap();
    users::add_user(&conn, "Bob").unwrap();
    stocks::add_stock(&conn, "AAPL", Some("Apple Inc"), None).unwrap();
    stocks::add_stock(&conn, "BHP", Some("BHP Group"), Some("ASX")).unwrap();
    conn
}

fn run_tx(conn: &Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["finbot", "tx"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    let (_, sub) = matches.subcommand().unwrap();
    transactions::handle(conn, sub)
}

fn filter_for(conn: &Connection, args: &[&str]) -> transactions::TransactionFilter {
    let mut argv = vec!["finbot", "tx", "list"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    let (_, tx) = matches.subcommand().unwrap();
    let (_, list) = tx.subcommand().unwrap();
    transactions::TransactionFilter::from_matches(conn, list).unwrap()
}

fn seed(conn: &Connection) {
    for args in [
        ["--user", "Alice", "--stock", "AAPL", "--date", "2024-06-30", "--type", "buy", "--units", "10", "--price", "100"],
        ["--user", "Alice", "--stock", "aapl", "--date", "2024-07-01", "--type", "BUY", "--units", "5", "--price", "110"],
        ["--user", "Alice", "--stock", "BHP", "--date", "2024-09-10", "--type", "buy", "--units", "20", "--price", "45"],
        ["--user", "Bob", "--stock", "AAPL", "--date", "2025-01-02", "--type", "buy", "--units", "1", "--price", "200"],
    ] {
        let mut argv = vec!["add"];
        argv.extend_from_slice(&args);
        run_tx(conn, &argv).unwrap();
    }
}

#[test]
fn add_derives_value_cost_and_fy() {
    let conn = setup();
    run_tx(
        &conn,
        &[
            "add", "--user", "Alice", "--stock", "AAPL", "--date", "2024-07-01", "--type", "buy",
            "--units", "10", "--price", "150.00", "--fee", "5.00", "--notes", "  first  ",
        ],
    )
    .unwrap();

    let t = transactions::get_transaction(&conn, 1).unwrap();
    assert_eq!(t.value, Decimal::from_str("1500").unwrap());
    assert_eq!(t.cost, Decimal::from_str("1505").unwrap());
    assert_eq!(t.fy, "2024-25");
    assert_eq!(t.notes.as_deref(), Some("first"));
}

#[test]
fn add_accepts_explicit_fy_label_in_long_form() {
    let conn = setup();
    run_tx(
        &conn,
        &[
            "add", "--user", "1", "--stock", "BHP", "--date", "2024-06-30", "--type", "sell",
            "--units", "-3", "--price", "40", "--fy", "2024-2025",
        ],
    )
    .unwrap();
    let t = transactions::get_transaction(&conn, 1).unwrap();
    assert_eq!(t.fy, "2024-25");
    assert_eq!(t.units, Decimal::from(3));
}

#[test]
fn add_rejects_unknown_user_stock_and_type() {
    let conn = setup();
    let base = |user: &'static str, stock: &'static str, ty: &'static str| {
        vec![
            "add", "--user", user, "--stock", stock, "--date", "2024-07-01", "--type", ty,
            "--units", "1", "--price", "1",
        ]
    };
    assert!(run_tx(&conn, &base("Carol", "AAPL", "buy")).is_err());
    assert!(run_tx(&conn, &base("Alice", "MSFT", "buy")).is_err());
    assert!(run_tx(&conn, &base("Alice", "AAPL", "hold")).is_err());
    assert!(
        transactions::query_rows(&conn, &Default::default())
            .unwrap()
            .is_empty()
    );
}

#[test]
fn list_orders_newest_first_and_applies_limit() {
    let conn = setup();
    seed(&conn);

    let all = transactions::query_rows(&conn, &filter_for(&conn, &[])).unwrap();
    let dates: Vec<&str> = all.iter().map(|r| r.date.as_str()).collect();
    assert_eq!(dates, vec!["2025-01-02", "2024-09-10", "2024-07-01", "2024-06-30"]);

    let limited = transactions::query_rows(&conn, &filter_for(&conn, &["--limit", "2"])).unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].user, "Bob");
}

#[test]
fn list_filters_by_user_stock_and_fy() {
    let conn = setup();
    seed(&conn);

    let alice = transactions::query_rows(&conn, &filter_for(&conn, &["--user", "Alice"])).unwrap();
    assert_eq!(alice.len(), 3);

    let aapl = transactions::query_rows(
        &conn,
        &filter_for(&conn, &["--user", "Alice", "--stock", " aapl "]),
    )
    .unwrap();
    assert_eq!(aapl.len(), 2);
    assert!(aapl.iter().all(|r| r.stock_name == "Apple Inc"));

    let fy = transactions::query_rows(&conn, &filter_for(&conn, &["--fy", "2024/25"])).unwrap();
    assert_eq!(fy.len(), 3);
    assert!(fy.iter().all(|r| r.fy == "2024-25"));

    let prior = transactions::query_rows(&conn, &filter_for(&conn, &["--fy", "2023-24"])).unwrap();
    assert_eq!(prior.len(), 1);
    assert_eq!(prior[0].date, "2024-06-30");
}

#[test]
fn note_is_the_only_editable_field() {
    let conn = setup();
    seed(&conn);

    run_tx(&conn, &["note", "--id", "2", "--text", "rebalanced"]).unwrap();
    let t = transactions::get_transaction(&conn, 2).unwrap();
    assert_eq!(t.notes.as_deref(), Some("rebalanced"));
    assert_eq!(t.units, Decimal::from(5));

    run_tx(&conn, &["note", "--id", "2", "--text", "   "]).unwrap();
    assert!(transactions::get_transaction(&conn, 2).unwrap().notes.is_none());

    assert!(run_tx(&conn, &["note", "--id", "99", "--text", "x"]).is_err());
}
