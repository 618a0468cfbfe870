// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::migrations::{AppliedMigration, applied_migrations, pending_migrations};
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SchemaStatus {
    pub applied: Vec<AppliedMigration>,
    pub pending: Vec<u32>,
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("status", sub)) => {
            let st = status(conn)?;
            if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &st)? {
                return Ok(());
            }
            let mut rows: Vec<Vec<String>> = st
                .applied
                .into_iter()
                .map(|a| {
                    vec![
                        a.version.to_string(),
                        a.applied_at,
                        a.description.unwrap_or_default(),
                    ]
                })
                .collect();
            rows.extend(
                st.pending
                    .iter()
                    .map(|v| vec![v.to_string(), "pending".into(), String::new()]),
            );
            println!(
                "{}",
                pretty_table(&["Version", "Applied At", "Description"], rows)
            );
        }
        _ => {}
    }
    Ok(())
}

pub fn status(conn: &Connection) -> Result<SchemaStatus> {
    Ok(SchemaStatus {
        applied: applied_migrations(conn)?,
        pending: pending_migrations(conn)?
            .into_iter()
            .map(|m| m.version)
            .collect(),
    })
}
