// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::transactions::user_trades;
use crate::fifo::LotBook;
use crate::models::{RealizedGain, TradeType};
use crate::utils::{
    canonical_fy, financial_year, fy_bounds, id_for_user, maybe_print_json, pretty_table,
};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::HashMap;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let user_id = id_for_user(conn, m.get_one::<String>("user").unwrap())?;
    let fy = canonical_fy(m.get_one::<String>("fy").unwrap())?;
    let rows = realized_gains(conn, user_id, &fy)?;
    if maybe_print_json(m.get_flag("json"), m.get_flag("jsonl"), &rows)? {
        return Ok(());
    }

    let total: Decimal = rows.iter().map(|r| r.gain).sum();
    let mut table_rows: Vec<Vec<String>> = rows
        .into_iter()
        .map(|row| {
            vec![
                row.symbol,
                row.date.to_string(),
                format!("{:.4}", row.units),
                format!("{:.2}", row.proceeds),
                format!("{:.2}", row.cost_basis),
                format!("{:.2}", row.gain),
            ]
        })
        .collect();
    table_rows.push(vec![
        "Total".into(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        format!("{:.2}", total),
    ]);
    let (first, last) = fy_bounds(&fy)?;
    println!("Realized gains for FY {} ({} to {})", fy, first, last);
    println!(
        "{}",
        pretty_table(
            &["Stock", "Sell Date", "Units", "Proceeds", "Cost Basis", "Gain"],
            table_rows
        )
    );
    Ok(())
}

/// Gains on every sell the user made in financial year `fy`, matched FIFO
/// against all of their earlier trades in the same stock.
pub fn realized_gains(conn: &Connection, user_id: i64, fy: &str) -> Result<Vec<RealizedGain>> {
    let target = canonical_fy(fy)?;
    let trades = user_trades(conn, user_id, None)?;

    let in_target = |fy: &str, date: NaiveDate| {
        canonical_fy(fy).unwrap_or_else(|_| financial_year(date)) == target
    };

    // trades after a symbol's last sell in the target year cannot affect it
    let mut cutoff: HashMap<&str, NaiveDate> = HashMap::new();
    for t in &trades {
        if t.r#type == TradeType::Sell && in_target(&t.fy, t.date) {
            cutoff
                .entry(t.symbol.as_str())
                .and_modify(|d| *d = (*d).max(t.date))
                .or_insert(t.date);
        }
    }

    let mut books: HashMap<&str, LotBook> = HashMap::new();
    let mut results = Vec::new();
    for t in &trades {
        let Some(&last) = cutoff.get(t.symbol.as_str()) else {
            continue;
        };
        if t.date > last {
            continue;
        }
        let book = books
            .entry(t.symbol.as_str())
            .or_insert_with(|| LotBook::new(&t.symbol));
        match t.r#type {
            TradeType::Buy => book.buy(t.date, t.units, t.cost),
            TradeType::Sell => {
                let cost_basis = book.sell(t.date, t.units)?;
                if in_target(&t.fy, t.date) {
                    results.push(RealizedGain {
                        symbol: t.symbol.clone(),
                        date: t.date,
                        units: t.units,
                        proceeds: t.cost,
                        cost_basis,
                        gain: t.cost - cost_basis,
                    });
                }
            }
        }
    }
    Ok(results)
}
