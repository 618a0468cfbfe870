// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::transactions::user_trades;
use crate::fifo::LotBook;
use crate::models::{Holding, TradeType};
use crate::utils::{id_for_user, maybe_print_json, parse_date, pretty_table};
use anyhow::Result;
use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use std::collections::BTreeMap;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let user_id = id_for_user(conn, m.get_one::<String>("user").unwrap())?;
    let as_of = match m.get_one::<String>("date") {
        Some(raw) => parse_date(raw)?,
        None => Local::now().date_naive(),
    };
    let data = holdings(conn, user_id, as_of)?;
    if !maybe_print_json(m.get_flag("json"), m.get_flag("jsonl"), &data)? {
        let rows = data
            .into_iter()
            .map(|h| {
                vec![
                    h.symbol,
                    h.name.unwrap_or_default(),
                    format!("{:.4}", h.units),
                    format!("{:.2}", h.cost_basis),
                ]
            })
            .collect();
        println!("Holdings as of {}", as_of);
        println!(
            "{}",
            pretty_table(&["Stock", "Name", "Units", "Cost Basis"], rows)
        );
    }
    Ok(())
}

/// Open positions for `user_id` from trades dated on or before `as_of`.
pub fn holdings(conn: &Connection, user_id: i64, as_of: NaiveDate) -> Result<Vec<Holding>> {
    let mut books: BTreeMap<String, (LotBook, Option<String>)> = BTreeMap::new();
    for t in user_trades(conn, user_id, Some(as_of))? {
        let (book, _) = books
            .entry(t.symbol.clone())
            .or_insert_with(|| (LotBook::new(&t.symbol), t.stock_name.clone()));
        match t.r#type {
            TradeType::Buy => book.buy(t.date, t.units, t.cost),
            TradeType::Sell => {
                book.sell(t.date, t.units)?;
            }
        }
    }

    Ok(books
        .into_iter()
        .filter(|(_, (book, _))| !book.units().is_zero())
        .map(|(symbol, (book, name))| Holding {
            symbol,
            name,
            units: book.units(),
            cost_basis: book.cost_basis(),
        })
        .collect())
}
