// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::Stock;
use crate::utils::{http_client, maybe_print_json, normalize_symbol, pretty_table};
use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use csv::ReaderBuilder;
use rusqlite::{Connection, params};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use tracing::{info, warn};

/// Where a market publishes its list of listed companies.
#[derive(Debug, Clone, Copy)]
pub struct ListingSource {
    pub market: &'static str,
    pub url: &'static str,
    pub symbol_column: &'static str,
    pub name_column: &'static str,
}

pub const LISTING_SOURCES: &[ListingSource] = &[ListingSource {
    market: "ASX",
    url: "https://asx.api.markitdigital.com/asx-research/1.0/companies/directory/file",
    symbol_column: "ASX code",
    name_column: "Company name",
}];

#[derive(Debug, Default, Serialize)]
pub struct SyncResult {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub archived: Vec<String>,
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            let name = sub.get_one::<String>("name").map(|s| s.as_str());
            let market = sub.get_one::<String>("market").map(|s| s.as_str());
            add_stock(conn, symbol, name, market)?;
            println!("Added stock {}", normalize_symbol(symbol));
        }
        Some(("list", sub)) => {
            let stocks = list_stocks(conn, sub.get_flag("all"))?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &stocks)? {
                let rows = stocks
                    .into_iter()
                    .map(|s| {
                        vec![
                            s.symbol,
                            s.name.unwrap_or_default(),
                            s.market.unwrap_or_default(),
                            if s.is_active { "yes".into() } else { "no".into() },
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["Symbol", "Name", "Market", "Active"], rows)
                );
            }
        }
        Some(("archive", sub)) => {
            let symbol = sub.get_one::<String>("symbol").unwrap();
            archive_stock(conn, symbol)?;
            println!("Archived stock {}", normalize_symbol(symbol));
        }
        Some(("sync", sub)) => {
            let market = sub.get_one::<String>("market").unwrap().trim().to_uppercase();
            let listing = fetch_listing(&market)?;
            let res = sync_listing(conn, &market, &listing)?;
            println!(
                "{}: {} created, {} updated, {} archived",
                market,
                res.created.len(),
                res.updated.len(),
                res.archived.len()
            );
        }
        _ => {}
    }
    Ok(())
}

pub fn add_stock(
    conn: &Connection,
    symbol: &str,
    name: Option<&str>,
    market: Option<&str>,
) -> Result<i64> {
    let symbol = normalize_symbol(symbol);
    if symbol.is_empty() {
        bail!("Stock symbol must not be empty");
    }
    let name = name.map(str::trim).filter(|s| !s.is_empty());
    let market = market
        .map(|m| m.trim().to_uppercase())
        .filter(|m| !m.is_empty());
    conn.execute(
        "INSERT INTO stock(symbol, name, market) VALUES (?1, ?2, ?3)",
        params![symbol, name, market],
    )
    .with_context(|| format!("Add stock {}", symbol))?;
    Ok(conn.last_insert_rowid())
}

pub fn list_stocks(conn: &Connection, include_archived: bool) -> Result<Vec<Stock>> {
    let sql = if include_archived {
        "SELECT id, symbol, name, market, is_active, archived_at FROM stock ORDER BY symbol"
    } else {
        "SELECT id, symbol, name, market, is_active, archived_at FROM stock WHERE is_active=1 ORDER BY symbol"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |r| {
        Ok(Stock {
            id: r.get(0)?,
            symbol: r.get(1)?,
            name: r.get(2)?,
            market: r.get(3)?,
            is_active: r.get(4)?,
            archived_at: r.get(5)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn archive_stock(conn: &Connection, symbol: &str) -> Result<()> {
    let symbol = normalize_symbol(symbol);
    let n = conn.execute(
        "UPDATE stock SET is_active=0, archived_at=COALESCE(archived_at, ?2) WHERE symbol=?1",
        params![symbol, Utc::now().to_rfc3339()],
    )?;
    if n == 0 {
        bail!("Stock '{}' not found", symbol);
    }
    Ok(())
}

pub fn listing_source(market: &str) -> Result<&'static ListingSource> {
    LISTING_SOURCES
        .iter()
        .find(|s| s.market.eq_ignore_ascii_case(market.trim()))
        .ok_or_else(|| anyhow!("Sync for market '{}' is not supported", market))
}

pub fn fetch_listing(market: &str) -> Result<BTreeMap<String, String>> {
    let source = listing_source(market)?;
    info!(market = source.market, url = source.url, "fetching listing");
    let client = http_client()?;
    let body = client
        .get(source.url)
        .send()?
        .error_for_status()?
        .text()
        .with_context(|| format!("Read {} listing", source.market))?;
    parse_listing(source, body.as_bytes())
}

/// Read a listing CSV into `SYMBOL -> company name`.
pub fn parse_listing<R: Read>(
    source: &ListingSource,
    reader: R,
) -> Result<BTreeMap<String, String>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| anyhow!("Listing is missing column '{}'", name))
    };
    let sym_idx = column(source.symbol_column)?;
    let name_idx = column(source.name_column)?;

    let mut listing = BTreeMap::new();
    for rec in rdr.records() {
        let rec = rec?;
        let symbol = normalize_symbol(rec.get(sym_idx).unwrap_or(""));
        if symbol.is_empty() {
            continue;
        }
        let name = rec.get(name_idx).unwrap_or("").trim().to_string();
        listing.insert(symbol, name);
    }
    Ok(listing)
}

/// Upsert a market listing: create new symbols, refresh renamed or archived
/// ones, and archive this market's active stocks that are no longer listed.
pub fn sync_listing(
    conn: &mut Connection,
    market: &str,
    listing: &BTreeMap<String, String>,
) -> Result<SyncResult> {
    struct Existing {
        id: i64,
        name: Option<String>,
        market: Option<String>,
        is_active: bool,
    }

    let market = market.trim().to_uppercase();
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;

    let mut existing: HashMap<String, Existing> = HashMap::new();
    {
        let mut stmt = tx.prepare("SELECT id, symbol, name, market, is_active FROM stock")?;
        let rows = stmt.query_map([], |r| {
            Ok((
                r.get::<_, String>(1)?,
                Existing {
                    id: r.get(0)?,
                    name: r.get(2)?,
                    market: r.get(3)?,
                    is_active: r.get(4)?,
                },
            ))
        })?;
        for row in rows {
            let (symbol, e) = row?;
            existing.insert(symbol, e);
        }
    }

    let mut res = SyncResult::default();
    for (symbol, name) in listing {
        match existing.get(symbol) {
            Some(e) if e.market.as_deref().is_some_and(|m| m != market) => {
                warn!(%symbol, listed = %market, "symbol belongs to another market, skipping");
            }
            Some(e) => {
                let changed = e.name.as_deref() != Some(name.as_str())
                    || !e.is_active
                    || e.market.is_none();
                if changed {
                    tx.execute(
                        "UPDATE stock SET name=?2, market=?3, is_active=1, archived_at=NULL WHERE id=?1",
                        params![e.id, name, market],
                    )?;
                    res.updated.push(symbol.clone());
                }
            }
            None => {
                tx.execute(
                    "INSERT INTO stock(symbol, name, market) VALUES (?1, ?2, ?3)",
                    params![symbol, name, market],
                )?;
                res.created.push(symbol.clone());
            }
        }
    }

    let mut delisted: Vec<(&String, &Existing)> = existing
        .iter()
        .filter(|(sym, e)| {
            e.is_active && e.market.as_deref() == Some(market.as_str()) && !listing.contains_key(*sym)
        })
        .collect();
    delisted.sort_by(|a, b| a.0.cmp(b.0));
    for (symbol, e) in delisted {
        tx.execute(
            "UPDATE stock SET is_active=0, archived_at=?2 WHERE id=?1",
            params![e.id, now],
        )?;
        res.archived.push(symbol.clone());
    }

    tx.commit()?;
    info!(
        %market,
        created = res.created.len(),
        updated = res.updated.len(),
        archived = res.archived.len(),
        "listing synced"
    );
    Ok(res)
}
