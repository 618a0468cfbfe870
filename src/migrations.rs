// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Forward-only schema migrations recorded in the `schema_version` ledger.
//!
//! Each migration body runs together with its ledger insert inside one
//! IMMEDIATE transaction, so a version row exists if and only if the body was
//! committed. The ledger is re-read on every call; applied versions are never
//! cached in process.

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A versioned schema change. Released entries must never be edited.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema creation",
        sql: r#"
    CREATE TABLE stock(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL UNIQUE,
        name TEXT
    );

    CREATE TABLE users(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    );

    -- decimals are stored as canonical TEXT: units/price NUMERIC(12,4),
    -- value/cost NUMERIC(14,4), fee NUMERIC(10,4)
    CREATE TABLE "transaction"(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        stock_id INTEGER NOT NULL,
        date TEXT NOT NULL,
        type TEXT NOT NULL CHECK(type IN ('buy','sell')),
        units TEXT NOT NULL,
        price TEXT NOT NULL,
        value TEXT NOT NULL,
        fee TEXT NOT NULL DEFAULT '0',
        cost TEXT NOT NULL,
        fy TEXT NOT NULL,
        FOREIGN KEY(user_id) REFERENCES users(id),
        FOREIGN KEY(stock_id) REFERENCES stock(id)
    );
    "#,
    },
    Migration {
        version: 2,
        description: "Transaction notes and stock listing metadata",
        sql: r#"
    ALTER TABLE "transaction" ADD COLUMN notes TEXT;
    ALTER TABLE stock ADD COLUMN market TEXT;
    ALTER TABLE stock ADD COLUMN is_active INTEGER NOT NULL DEFAULT 1;
    ALTER TABLE stock ADD COLUMN archived_at TEXT;
    CREATE INDEX idx_transaction_user_date ON "transaction"(user_id, date);
    CREATE INDEX idx_transaction_fy ON "transaction"(fy);
    "#,
    },
];

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration {version} ('{description}') failed and was rolled back")]
    Failed {
        version: u32,
        description: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("could not record migration {version} in schema_version")]
    Ledger {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("schema ledger error: {0}")]
    Storage(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOutcome {
    Applied,
    AlreadyApplied,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationStep {
    pub version: u32,
    pub description: String,
    pub outcome: MigrationOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedMigration {
    pub version: u32,
    pub applied_at: String,
    pub description: Option<String>,
}

pub fn ensure_version_table(conn: &Connection) -> Result<(), MigrationError> {
    conn.execute_batch(
        r#"
    CREATE TABLE IF NOT EXISTS schema_version(
        version INTEGER PRIMARY KEY,
        applied_at TEXT NOT NULL DEFAULT (datetime('now')),
        description TEXT
    );
    "#,
    )?;
    Ok(())
}

pub fn is_applied(conn: &Connection, version: u32) -> Result<bool, MigrationError> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM schema_version WHERE version=?1",
            params![version],
            |r| r.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

/// Apply `sql` as migration `version` unless the ledger already records it.
///
/// The ledger check, the body and the ledger insert share one IMMEDIATE
/// transaction. Any failure rolls all of it back. A uniqueness conflict on the
/// ledger insert means another runner committed the same version first and is
/// reported as [`MigrationOutcome::AlreadyApplied`].
pub fn apply_migration(
    conn: &mut Connection,
    version: u32,
    description: &str,
    sql: &str,
) -> Result<MigrationOutcome, MigrationError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    ensure_version_table(&tx)?;

    if is_applied(&tx, version)? {
        debug!(version, "migration already applied, skipping");
        return Ok(MigrationOutcome::AlreadyApplied);
    }

    tx.execute_batch(sql).map_err(|source| MigrationError::Failed {
        version,
        description: description.to_string(),
        source,
    })?;

    if let Err(source) = tx.execute(
        "INSERT INTO schema_version(version, description) VALUES (?1, ?2)",
        params![version, description],
    ) {
        if !is_unique_violation(&source) {
            return Err(MigrationError::Ledger { version, source });
        }
        tx.rollback()?;
        return settle_ledger_conflict(conn, version, source);
    }

    tx.commit()?;
    info!(version, description, "applied migration");
    Ok(MigrationOutcome::Applied)
}

/// Called after a ledger-insert conflict has been rolled back. The conflict only
/// counts as success when the ledger now holds the version.
fn settle_ledger_conflict(
    conn: &Connection,
    version: u32,
    source: rusqlite::Error,
) -> Result<MigrationOutcome, MigrationError> {
    ensure_version_table(conn)?;
    if is_applied(conn, version)? {
        warn!(version, "migration recorded by a concurrent runner");
        Ok(MigrationOutcome::AlreadyApplied)
    } else {
        Err(MigrationError::Ledger { version, source })
    }
}

pub fn migrate(conn: &mut Connection) -> Result<Vec<MigrationStep>, MigrationError> {
    run_migrations(conn, MIGRATIONS)
}

pub fn run_migrations(
    conn: &mut Connection,
    migrations: &[Migration],
) -> Result<Vec<MigrationStep>, MigrationError> {
    ensure_version_table(conn)?;
    let mut ordered = migrations.to_vec();
    ordered.sort_by_key(|m| m.version);

    let mut steps = Vec::with_capacity(ordered.len());
    for m in ordered {
        let outcome = apply_migration(conn, m.version, m.description, m.sql)?;
        steps.push(MigrationStep {
            version: m.version,
            description: m.description.to_string(),
            outcome,
        });
    }
    Ok(steps)
}

pub fn applied_migrations(conn: &Connection) -> Result<Vec<AppliedMigration>, MigrationError> {
    let mut stmt = conn.prepare(
        "SELECT version, applied_at, description FROM schema_version ORDER BY version",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(AppliedMigration {
            version: r.get(0)?,
            applied_at: r.get(1)?,
            description: r.get(2)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn current_version(conn: &Connection) -> Result<u32, MigrationError> {
    let v: Option<u32> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))?;
    Ok(v.unwrap_or(0))
}

pub fn pending_migrations(conn: &Connection) -> Result<Vec<Migration>, MigrationError> {
    let mut pending = Vec::new();
    for m in MIGRATIONS {
        if !is_applied(conn, m.version)? {
            pending.push(*m);
        }
    }
    Ok(pending)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => matches!(
            e.extended_code,
            rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        ),
        _ => false,
    }
}
