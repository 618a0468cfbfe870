// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::Settings;
use crate::migrations::{self, MigrationOutcome};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static APP: Lazy<(&str, &str, &str)> = Lazy::new(|| ("com.pyfinbot", "FinBot", "finbot"));

pub fn default_db_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("finbot.sqlite"))
}

pub fn open(path: &Path) -> Result<Connection> {
    let conn = if path.as_os_str() == ":memory:" {
        Connection::open_in_memory()?
    } else {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Create DB directory {}", parent.display()))?;
        }
        Connection::open(path).with_context(|| format!("Open DB at {}", path.display()))?
    };
    configure(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

/// Open the configured database and bring its schema up to date.
///
/// A migration failure is returned to the caller so startup halts instead of
/// running against a partially migrated schema.
pub fn open_or_init(settings: &Settings) -> Result<Connection> {
    let path = &settings.database_path;
    let mut conn = open(path)?;
    let steps = migrations::migrate(&mut conn)
        .with_context(|| format!("Migrate schema at {}", path.display()))?;
    for step in steps {
        match step.outcome {
            MigrationOutcome::Applied => info!(
                version = step.version,
                description = %step.description,
                db = %path.display(),
                "schema migrated"
            ),
            MigrationOutcome::AlreadyApplied => {
                debug!(version = step.version, "schema version current")
            }
        }
    }
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;
    PRAGMA busy_timeout = 5000;
    "#,
    )?;
    Ok(())
}
