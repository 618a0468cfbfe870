// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::transactions::{NewTransaction, insert_transaction};
use crate::models::TradeType;
use crate::utils::{id_for_user, normalize_symbol, parse_date, parse_decimal};
use anyhow::{Context, Result, anyhow};
use csv::ReaderBuilder;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use std::collections::{HashMap, hash_map::Entry};
use std::io::Read;
use tracing::info;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => {
            let path = sub.get_one::<String>("path").unwrap().trim();
            let user_id = id_for_user(conn, sub.get_one::<String>("user").unwrap())?;
            let file = std::fs::File::open(path).with_context(|| format!("Open CSV {}", path))?;
            let n = import_transactions(conn, user_id, file)?;
            println!("Imported {} transactions from {}", n, path);
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Import trades for one user from a CSV with `date,type,stock,units,price`
/// columns and optional `fee`, `notes` and `fy` columns, matched by header name.
/// Unknown stock symbols are created. The whole file is one transaction.
pub fn import_transactions<R: Read>(conn: &mut Connection, user_id: i64, reader: R) -> Result<usize> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    let required = |name: &str| column(name).ok_or_else(|| anyhow!("CSV is missing column '{}'", name));
    let (date_idx, type_idx, stock_idx, units_idx, price_idx) = (
        required("date")?,
        required("type")?,
        required("stock")?,
        required("units")?,
        required("price")?,
    );
    let (fee_idx, notes_idx, fy_idx) = (column("fee"), column("notes"), column("fy"));

    let tx = conn.transaction()?;
    let mut stock_cache: HashMap<String, i64> = HashMap::new();
    let mut count = 0usize;

    for (idx, result) in rdr.records().enumerate() {
        let line = idx + 2;
        let rec = result?;
        let optional = |i: Option<usize>| {
            i.and_then(|i| rec.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };
        let field = |i: usize, name: &str| {
            optional(Some(i)).with_context(|| format!("Line {}: {} missing", line, name))
        };

        let date = parse_date(field(date_idx, "date")?).with_context(|| format!("Line {}", line))?;
        let r#type: TradeType = field(type_idx, "type")?
            .parse()
            .with_context(|| format!("Line {}", line))?;
        let symbol = normalize_symbol(field(stock_idx, "stock")?);
        let units = parse_decimal(field(units_idx, "units")?).with_context(|| format!("Line {}", line))?;
        let price = parse_decimal(field(price_idx, "price")?).with_context(|| format!("Line {}", line))?;
        let fee = match optional(fee_idx) {
            Some(raw) => parse_decimal(raw).with_context(|| format!("Line {}", line))?,
            None => Decimal::ZERO,
        };

        let stock_id = match stock_cache.entry(symbol.clone()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => *entry.insert(stock_id_or_create(&tx, &symbol)?),
        };

        let mut t = NewTransaction::new(user_id, stock_id, date, r#type, units, price, fee)
            .with_context(|| format!("Line {}", line))?
            .with_notes(optional(notes_idx));
        if let Some(fy) = optional(fy_idx) {
            t = t.with_fy(fy).with_context(|| format!("Line {}", line))?;
        }
        insert_transaction(&tx, &t).with_context(|| format!("Line {}", line))?;
        count += 1;
    }
    tx.commit()?;
    info!(user_id, rows = count, "imported transactions");
    Ok(count)
}

fn stock_id_or_create(conn: &Connection, symbol: &str) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM stock WHERE symbol=?1", params![symbol], |r| r.get(0))
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute("INSERT INTO stock(symbol) VALUES (?1)", params![symbol])?;
    info!(%symbol, "created stock during import");
    Ok(conn.last_insert_rowid())
}
