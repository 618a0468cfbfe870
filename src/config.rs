// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use std::env;
use std::path::PathBuf;

pub const DATABASE_ENV: &str = "FINBOT_DATABASE";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const LOG_ENV: &str = "FINBOT_LOG";

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: PathBuf,
    pub log_filter: String,
}

impl Settings {
    /// Resolve settings from CLI flags, the environment (including `.env`),
    /// and platform defaults, in that order.
    pub fn load(db_flag: Option<&str>, verbose: bool) -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_path = match db_flag
            .map(str::to_string)
            .or_else(|| env::var(DATABASE_ENV).ok())
            .or_else(|| env::var(DATABASE_URL_ENV).ok())
            .filter(|s| !s.trim().is_empty())
        {
            Some(raw) => database_path_from_url(&raw),
            None => crate::db::default_db_path()?,
        };

        let log_filter = if verbose {
            "debug".to_string()
        } else {
            env::var(LOG_ENV).unwrap_or_else(|_| "info".to_string())
        };

        Ok(Self {
            database_path,
            log_filter,
        })
    }
}

/// Accept either a plain path or an `sqlite:` connection string.
pub fn database_path_from_url(raw: &str) -> PathBuf {
    let s = raw.trim();
    let s = s
        .strip_prefix("sqlite://")
        .or_else(|| s.strip_prefix("sqlite:"))
        .unwrap_or(s);
    let s = s.split('?').next().unwrap_or(s);
    PathBuf::from(s)
}
