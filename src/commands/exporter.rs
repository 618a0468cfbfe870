// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::transactions::{TransactionFilter, TransactionRow, query_rows};
use crate::utils::id_for_user;
use anyhow::{Result, bail};
use rusqlite::Connection;
use std::path::Path;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => {
            let fmt = sub.get_one::<String>("format").unwrap().to_lowercase();
            let out = sub.get_one::<String>("out").unwrap().trim();
            let user_id = match sub.get_one::<String>("user") {
                Some(u) => Some(id_for_user(conn, u)?),
                None => None,
            };
            let n = export_transactions(conn, user_id, &fmt, Path::new(out))?;
            println!("Exported {} transactions to {}", n, out);
            Ok(())
        }
        _ => Ok(()),
    }
}

pub fn export_transactions(
    conn: &Connection,
    user_id: Option<i64>,
    fmt: &str,
    out: &Path,
) -> Result<usize> {
    let filter = TransactionFilter {
        user_id,
        ..Default::default()
    };
    let mut rows = query_rows(conn, &filter)?;
    rows.reverse(); // chronological

    match fmt {
        "csv" => write_csv(&rows, out)?,
        "json" => std::fs::write(out, serde_json::to_string_pretty(&rows)?)?,
        other => bail!("Unknown format: {} (use csv|json)", other),
    }
    Ok(rows.len())
}

fn write_csv(rows: &[TransactionRow], out: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(out)?;
    wtr.write_record([
        "date", "type", "stock", "units", "price", "fee", "notes", "user", "value", "cost", "fy",
    ])?;
    for r in rows {
        wtr.write_record([
            &r.date, &r.r#type, &r.symbol, &r.units, &r.price, &r.fee, &r.notes, &r.user,
            &r.value, &r.cost, &r.fy,
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
