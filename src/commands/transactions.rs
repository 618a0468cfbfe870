// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{TradeType, Transaction};
use crate::utils::{
    canonical_fy, decimal_from_db, financial_year, fit_numeric, id_for_stock, id_for_user,
    maybe_print_json, parse_date, parse_decimal, pretty_table,
};
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("note", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let text = sub.get_one::<String>("text").unwrap();
            set_notes(conn, id, text)?;
            println!("Updated notes on transaction #{}", id);
        }
        _ => {}
    }
    Ok(())
}

/// A trade ready to insert, with the derived `value`, `cost` and `fy` columns.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub user_id: i64,
    pub stock_id: i64,
    pub date: NaiveDate,
    pub r#type: TradeType,
    pub units: Decimal,
    pub price: Decimal,
    pub value: Decimal,
    pub fee: Decimal,
    pub cost: Decimal,
    pub fy: String,
    pub notes: Option<String>,
}

impl NewTransaction {
    /// `value = units * price`; `cost` is cash paid for a buy (value + fee) and
    /// net proceeds for a sell (value - fee).
    pub fn new(
        user_id: i64,
        stock_id: i64,
        date: NaiveDate,
        r#type: TradeType,
        units: Decimal,
        price: Decimal,
        fee: Decimal,
    ) -> Result<Self> {
        let units = fit_numeric(units.abs(), 12, 4, "units")?;
        if units.is_zero() {
            bail!("Transaction units must be non-zero");
        }
        if price.is_sign_negative() {
            bail!("Transaction price must not be negative");
        }
        if fee.is_sign_negative() {
            bail!("Transaction fee must not be negative");
        }
        let price = fit_numeric(price, 12, 4, "price")?;
        let fee = fit_numeric(fee, 10, 4, "fee")?;
        let value = fit_numeric(units * price, 14, 4, "value")?;
        let cost = match r#type {
            TradeType::Buy => value + fee,
            TradeType::Sell => value - fee,
        };
        let cost = fit_numeric(cost, 14, 4, "cost")?;
        Ok(Self {
            user_id,
            stock_id,
            date,
            r#type,
            units,
            price,
            value,
            fee,
            cost,
            fy: financial_year(date),
            notes: None,
        })
    }

    pub fn with_fy(mut self, label: &str) -> Result<Self> {
        self.fy = canonical_fy(label)?;
        Ok(self)
    }

    pub fn with_notes(mut self, notes: Option<&str>) -> Self {
        self.notes = notes
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        self
    }
}

pub fn insert_transaction(conn: &Connection, t: &NewTransaction) -> Result<i64> {
    conn.execute(
        r#"INSERT INTO "transaction"(user_id, stock_id, date, type, units, price, value, fee, cost, fy, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
        params![
            t.user_id,
            t.stock_id,
            t.date.to_string(),
            t.r#type.as_str(),
            t.units.to_string(),
            t.price.to_string(),
            t.value.to_string(),
            t.fee.to_string(),
            t.cost.to_string(),
            t.fy,
            t.notes
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user = sub.get_one::<String>("user").unwrap();
    let symbol = sub.get_one::<String>("stock").unwrap();
    let date = parse_date(sub.get_one::<String>("date").unwrap())?;
    let r#type: TradeType = sub.get_one::<String>("type").unwrap().parse()?;
    let units = parse_decimal(sub.get_one::<String>("units").unwrap())?;
    let price = parse_decimal(sub.get_one::<String>("price").unwrap())?;
    let fee = match sub.get_one::<String>("fee") {
        Some(raw) => parse_decimal(raw)?,
        None => Decimal::ZERO,
    };

    let user_id = id_for_user(conn, user)?;
    let stock_id = id_for_stock(conn, symbol)?;

    let mut t = NewTransaction::new(user_id, stock_id, date, r#type, units, price, fee)?
        .with_notes(sub.get_one::<String>("notes").map(|s| s.as_str()));
    if let Some(fy) = sub.get_one::<String>("fy") {
        t = t.with_fy(fy)?;
    }
    let id = insert_transaction(conn, &t)?;
    println!(
        "Recorded #{} {} {} x {} @ {} (fee {}, cost {}, FY {})",
        id,
        t.r#type,
        t.units,
        symbol.trim().to_uppercase(),
        t.price,
        t.fee,
        t.cost,
        t.fy
    );
    Ok(())
}

/// Only the notes of a recorded trade may change. Financial fields are
/// corrected with a compensating transaction instead.
pub fn set_notes(conn: &Connection, id: i64, text: &str) -> Result<()> {
    let text = text.trim();
    let notes = if text.is_empty() { None } else { Some(text) };
    let n = conn.execute(
        r#"UPDATE "transaction" SET notes=?2 WHERE id=?1"#,
        params![id, notes],
    )?;
    if n == 0 {
        bail!("Transaction #{} not found", id);
    }
    Ok(())
}

pub fn get_transaction(conn: &Connection, id: i64) -> Result<Transaction> {
    let row = conn
        .query_row(
            r#"SELECT id, user_id, stock_id, date, type, units, price, value, fee, cost, fy, notes
             FROM "transaction" WHERE id=?1"#,
            params![id],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    [
                        r.get::<_, String>(5)?,
                        r.get::<_, String>(6)?,
                        r.get::<_, String>(7)?,
                        r.get::<_, String>(8)?,
                        r.get::<_, String>(9)?,
                    ],
                    r.get::<_, String>(10)?,
                    r.get::<_, Option<String>>(11)?,
                ))
            },
        )
        .optional()?
        .with_context(|| format!("Transaction #{} not found", id))?;

    let (id, user_id, stock_id, date_s, type_s, [units, price, value, fee, cost], fy, notes) = row;
    Ok(Transaction {
        id,
        user_id,
        stock_id,
        date: parse_date(&date_s)?,
        r#type: type_s.parse()?,
        units: decimal_from_db(&units, "units")?,
        price: decimal_from_db(&price, "price")?,
        value: decimal_from_db(&value, "value")?,
        fee: decimal_from_db(&fee, "fee")?,
        cost: decimal_from_db(&cost, "cost")?,
        fy,
        notes,
    })
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let filter = TransactionFilter::from_matches(conn, sub)?;
    let data = query_rows(conn, &filter)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.date.clone(),
                    r.user.clone(),
                    r.symbol.clone(),
                    r.r#type.clone(),
                    r.units.clone(),
                    r.price.clone(),
                    r.fee.clone(),
                    r.cost.clone(),
                    r.fy.clone(),
                    r.notes.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &[
                    "ID", "Date", "User", "Stock", "Type", "Units", "Price", "Fee", "Cost", "FY",
                    "Notes"
                ],
                rows,
            )
        );
    }
    Ok(())
}

#[derive(Debug, Default, Clone)]
pub struct TransactionFilter {
    pub user_id: Option<i64>,
    pub symbol: Option<String>,
    pub fy: Option<String>,
    pub limit: Option<usize>,
}

impl TransactionFilter {
    pub fn from_matches(conn: &Connection, sub: &clap::ArgMatches) -> Result<Self> {
        let user_id = match sub.get_one::<String>("user") {
            Some(u) => Some(id_for_user(conn, u)?),
            None => None,
        };
        let fy = match sub.get_one::<String>("fy") {
            Some(f) => Some(canonical_fy(f)?),
            None => None,
        };
        Ok(Self {
            user_id,
            symbol: sub
                .get_one::<String>("stock")
                .map(|s| s.trim().to_uppercase()),
            fy,
            limit: sub.get_one::<usize>("limit").copied(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionRow {
    pub id: i64,
    pub date: String,
    pub user: String,
    pub symbol: String,
    pub stock_name: String,
    pub r#type: String,
    pub units: String,
    pub price: String,
    pub value: String,
    pub fee: String,
    pub cost: String,
    pub fy: String,
    pub notes: String,
}

/// Transactions joined with their user and stock, newest first.
pub fn query_rows(conn: &Connection, filter: &TransactionFilter) -> Result<Vec<TransactionRow>> {
    let mut sql = String::from(
        r#"SELECT t.id, t.date, u.name, s.symbol, s.name, t.type, t.units, t.price, t.value, t.fee, t.cost, t.fy, t.notes
         FROM "transaction" t
         JOIN users u ON t.user_id=u.id
         JOIN stock s ON t.stock_id=s.id
         WHERE 1=1"#,
    );
    let mut values: Vec<Value> = Vec::new();

    if let Some(user_id) = filter.user_id {
        sql.push_str(" AND t.user_id=?");
        values.push(Value::Integer(user_id));
    }
    if let Some(symbol) = &filter.symbol {
        sql.push_str(" AND s.symbol=?");
        values.push(Value::Text(symbol.clone()));
    }
    if let Some(fy) = &filter.fy {
        sql.push_str(" AND t.fy=?");
        values.push(Value::Text(fy.clone()));
    }
    sql.push_str(" ORDER BY t.date DESC, t.id DESC");
    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(values))?;

    let mut data = Vec::new();
    while let Some(r) = rows.next()? {
        data.push(TransactionRow {
            id: r.get(0)?,
            date: r.get(1)?,
            user: r.get(2)?,
            symbol: r.get(3)?,
            stock_name: r.get::<_, Option<String>>(4)?.unwrap_or_default(),
            r#type: r.get(5)?,
            units: r.get(6)?,
            price: r.get(7)?,
            value: r.get(8)?,
            fee: r.get(9)?,
            cost: r.get(10)?,
            fy: r.get(11)?,
            notes: r.get::<_, Option<String>>(12)?.unwrap_or_default(),
        });
    }
    Ok(data)
}

/// Decoded trade used by the holdings and gains reports.
#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub symbol: String,
    pub stock_name: Option<String>,
    pub date: NaiveDate,
    pub r#type: TradeType,
    pub units: Decimal,
    pub cost: Decimal,
    pub fy: String,
}

/// All of a user's trades dated on or before `until`, grouped by symbol and in
/// chronological order within each symbol.
pub fn user_trades(
    conn: &Connection,
    user_id: i64,
    until: Option<NaiveDate>,
) -> Result<Vec<TradeRecord>> {
    let mut stmt = conn.prepare_cached(
        r#"SELECT s.symbol, s.name, t.date, t.type, t.units, t.cost, t.fy
         FROM "transaction" t JOIN stock s ON t.stock_id=s.id
         WHERE t.user_id=?1 AND (?2 IS NULL OR t.date<=?2)
         ORDER BY s.symbol, t.date, t.id"#,
    )?;
    let rows = stmt.query_map(params![user_id, until.map(|d| d.to_string())], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, Option<String>>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, String>(5)?,
            r.get::<_, String>(6)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (symbol, stock_name, date_s, type_s, units_s, cost_s, fy) = row?;
        let date = parse_date(&date_s)
            .with_context(|| format!("Invalid trade date '{}' for {}", date_s, symbol))?;
        let r#type: TradeType = type_s
            .parse()
            .with_context(|| format!("Invalid trade type for {} on {}", symbol, date_s))?;
        let units = decimal_from_db(&units_s, "units")?.abs();
        let cost = decimal_from_db(&cost_s, "cost")?;
        out.push(TradeRecord {
            symbol,
            stock_name,
            date,
            r#type,
            units,
            cost,
            fy,
        });
    }
    Ok(out)
}
