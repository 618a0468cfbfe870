// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    pub id: i64,
    pub symbol: String,
    pub name: Option<String>,
    pub market: Option<String>,
    pub is_active: bool,
    pub archived_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "buy",
            TradeType::Sell => "sell",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(TradeType::Buy),
            "sell" => Ok(TradeType::Sell),
            other => Err(anyhow!("Invalid transaction type '{}', expected buy|sell", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub stock_id: i64,
    pub date: NaiveDate,
    pub r#type: TradeType,
    pub units: Decimal,
    pub price: Decimal,
    pub value: Decimal, // units x price at trade time
    pub fee: Decimal,
    pub cost: Decimal, // net cash effect including fee
    pub fy: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub symbol: String,
    pub name: Option<String>,
    pub units: Decimal,
    pub cost_basis: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealizedGain {
    pub symbol: String,
    pub date: NaiveDate,
    pub units: Decimal,
    pub proceeds: Decimal,
    pub cost_basis: Decimal,
    pub gain: Decimal,
}
