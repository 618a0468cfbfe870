// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, NaiveDate};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use rust_decimal::Decimal;

const UA: &str = concat!("finbot/", env!("CARGO_PKG_VERSION"));

pub fn http_client() -> Result<reqwest::blocking::Client> {
    let c = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .user_agent(UA)
        .build()?;
    Ok(c)
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

/// Decimal read back from a TEXT column.
pub fn decimal_from_db(s: &str, what: &str) -> Result<Decimal> {
    Decimal::from_str_exact(s).with_context(|| format!("Invalid stored {} '{}'", what, s))
}

/// Round to `scale` places and reject values that overflow NUMERIC(precision, scale).
pub fn fit_numeric(d: Decimal, precision: u32, scale: u32, field: &str) -> Result<Decimal> {
    let r = d.round_dp(scale);
    let limit = Decimal::from(10u64.pow(precision - scale));
    if r.abs() >= limit {
        bail!(
            "{} {} exceeds NUMERIC({},{}) range",
            field,
            d,
            precision,
            scale
        );
    }
    Ok(r)
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

/// Resolve a user by numeric id or by name. Names are not unique, so a name
/// shared by several users is rejected.
pub fn id_for_user(conn: &Connection, key: &str) -> Result<i64> {
    let key = key.trim();
    if let Ok(id) = key.parse::<i64>() {
        let found: Option<i64> = conn
            .query_row("SELECT id FROM users WHERE id=?1", params![id], |r| r.get(0))
            .optional()?;
        return found.ok_or_else(|| anyhow!("User #{} not found", id));
    }

    let mut stmt = conn.prepare("SELECT id FROM users WHERE name=?1 ORDER BY id")?;
    let ids = stmt
        .query_map(params![key], |r| r.get::<_, i64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    match ids.as_slice() {
        [] => Err(anyhow!("User '{}' not found", key)),
        [id] => Ok(*id),
        _ => Err(anyhow!(
            "User name '{}' is ambiguous ({} users); use the numeric id",
            key,
            ids.len()
        )),
    }
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

pub fn id_for_stock(conn: &Connection, symbol: &str) -> Result<i64> {
    let symbol = normalize_symbol(symbol);
    let mut stmt = conn.prepare("SELECT id FROM stock WHERE symbol=?1")?;
    let id: i64 = stmt
        .query_row(params![symbol], |r| r.get(0))
        .with_context(|| format!("Stock '{}' not found", symbol))?;
    Ok(id)
}

/// True when the error chain carries a store-level constraint failure
/// (UNIQUE, CHECK, NOT NULL or FOREIGN KEY).
pub fn is_constraint_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation
        )
    })
}

// Financial years run 1 July to 30 June and are labelled "2024-25".

pub fn financial_year(date: NaiveDate) -> String {
    let start = if date.month() >= 7 {
        date.year()
    } else {
        date.year() - 1
    };
    fy_label(start)
}

fn fy_label(start: i32) -> String {
    format!("{}-{:02}", start, (start + 1).rem_euclid(100))
}

/// Canonicalise a free-text FY label. Accepts "2024-25", "2024-2025",
/// "2024/25" and a bare start year "2024".
pub fn canonical_fy(label: &str) -> Result<String> {
    let s = label.trim();
    let invalid = || anyhow!("Invalid financial year '{}', expected e.g. 2024-25", label);
    let (start_s, end_s) = match s.split_once(['-', '/']) {
        Some((a, b)) => (a.trim(), Some(b.trim())),
        None => (s, None),
    };
    if start_s.len() != 4 {
        return Err(invalid());
    }
    let start: i32 = start_s.parse().map_err(|_| invalid())?;
    if let Some(end_s) = end_s {
        let end: i32 = end_s.parse().map_err(|_| invalid())?;
        let ok = match end_s.len() {
            2 => end == (start + 1).rem_euclid(100),
            4 => end == start + 1,
            _ => false,
        };
        if !ok {
            return Err(invalid());
        }
    }
    Ok(fy_label(start))
}

pub fn fy_bounds(label: &str) -> Result<(NaiveDate, NaiveDate)> {
    let canonical = canonical_fy(label)?;
    let start: i32 = canonical[..4].parse()?;
    let first = NaiveDate::from_ymd_opt(start, 7, 1).context("Invalid FY start")?;
    let last = NaiveDate::from_ymd_opt(start + 1, 6, 30).context("Invalid FY end")?;
    Ok((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn financial_year_splits_on_july() {
        assert_eq!(financial_year(d("2024-07-01")), "2024-25");
        assert_eq!(financial_year(d("2025-06-30")), "2024-25");
        assert_eq!(financial_year(d("2025-07-01")), "2025-26");
        assert_eq!(financial_year(d("1999-12-31")), "1999-00");
    }

    #[test]
    fn canonical_fy_accepts_common_spellings() {
        assert_eq!(canonical_fy("2024-25").unwrap(), "2024-25");
        assert_eq!(canonical_fy("2024-2025").unwrap(), "2024-25");
        assert_eq!(canonical_fy(" 2024/25 ").unwrap(), "2024-25");
        assert_eq!(canonical_fy("2024").unwrap(), "2024-25");
        assert!(canonical_fy("2024-26").is_err());
        assert!(canonical_fy("24-25").is_err());
        assert!(canonical_fy("FY").is_err());
    }

    #[test]
    fn fy_bounds_cover_july_to_june() {
        let (first, last) = fy_bounds("2023-24").unwrap();
        assert_eq!(first, d("2023-07-01"));
        assert_eq!(last, d("2024-06-30"));
    }

    #[test]
    fn fit_numeric_rounds_and_limits() {
        let v = fit_numeric(Decimal::from_str("1.23456").unwrap(), 12, 4, "units").unwrap();
        assert_eq!(v, Decimal::from_str("1.2346").unwrap());
        assert!(fit_numeric(Decimal::from_str("123456789").unwrap(), 12, 4, "units").is_err());
        assert!(fit_numeric(Decimal::from_str("99999999.9999").unwrap(), 12, 4, "units").is_ok());
        assert!(fit_numeric(Decimal::from_str("1000000").unwrap(), 10, 4, "fee").is_err());
    }

    #[test]
    fn user_lookup_by_id_and_unique_name() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users(id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             INSERT INTO users(id, name) VALUES (1, 'Alice'), (2, 'Bob'), (3, 'Bob');",
        )
        .unwrap();
        assert_eq!(id_for_user(&conn, "Alice").unwrap(), 1);
        assert_eq!(id_for_user(&conn, " 2 ").unwrap(), 2);
        assert!(
            id_for_user(&conn, "Bob")
                .unwrap_err()
                .to_string()
                .contains("ambiguous")
        );
        assert!(id_for_user(&conn, "Carol").is_err());
        assert!(id_for_user(&conn, "9").is_err());
    }
}
