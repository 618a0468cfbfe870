// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::User;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::{Result, bail};
use rusqlite::{Connection, params};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            let id = add_user(conn, name)?;
            println!("Added user '{}' (#{})", name.trim(), id);
        }
        Some(("list", sub)) => {
            let users = list_users(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &users)? {
                let rows = users
                    .into_iter()
                    .map(|u| vec![u.id.to_string(), u.name])
                    .collect();
                println!("{}", pretty_table(&["ID", "Name"], rows));
            }
        }
        _ => {}
    }
    Ok(())
}

pub fn add_user(conn: &Connection, name: &str) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        bail!("User name must not be empty");
    }
    conn.execute("INSERT INTO users(name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare("SELECT id, name FROM users ORDER BY id")?;
    let rows = stmt.query_map([], |r| {
        Ok(User {
            id: r.get(0)?,
            name: r.get(1)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
