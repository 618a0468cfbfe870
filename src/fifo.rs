// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
struct Lot {
    date: NaiveDate,
    remaining: Decimal,
    original_units: Decimal,
    cost: Decimal, // units x price + fee
}

/// Open purchase lots for one stock, consumed first-in first-out.
#[derive(Debug, Default)]
pub struct LotBook {
    symbol: String,
    lots: Vec<Lot>,
}

impl LotBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            lots: Vec::new(),
        }
    }

    pub fn buy(&mut self, date: NaiveDate, units: Decimal, cost: Decimal) {
        let units = units.abs();
        if units.is_zero() {
            return;
        }
        self.lots.push(Lot {
            date,
            remaining: units,
            original_units: units,
            cost,
        });
    }

    /// Consume `units` from lots dated on or before `date` and return the
    /// cost basis of what was sold.
    pub fn sell(&mut self, date: NaiveDate, units: Decimal) -> Result<Decimal> {
        let mut remaining = units.abs();
        let mut basis = Decimal::ZERO;
        for lot in self.lots.iter_mut() {
            if remaining <= Decimal::ZERO {
                break;
            }
            if lot.remaining <= Decimal::ZERO {
                continue;
            }
            if lot.date > date {
                break;
            }
            let use_units = remaining.min(lot.remaining);
            basis += if lot.original_units.is_zero() {
                Decimal::ZERO
            } else {
                lot.cost * use_units / lot.original_units
            };
            lot.remaining -= use_units;
            remaining -= use_units;
        }

        if remaining > Decimal::ZERO {
            let has_prior_lot = self.lots.iter().any(|lot| lot.date <= date);
            return if has_prior_lot {
                Err(anyhow!(
                    "Sell of {} on {} exceeds available lot quantity before or on the sell date",
                    self.symbol,
                    date
                ))
            } else {
                Err(anyhow!(
                    "No purchase lots dated on or before sell of {} on {}",
                    self.symbol,
                    date
                ))
            };
        }
        self.lots.retain(|lot| lot.remaining > Decimal::ZERO);
        Ok(basis)
    }

    pub fn units(&self) -> Decimal {
        self.lots.iter().map(|l| l.remaining).sum()
    }

    /// Cost basis still carried by the open lots.
    pub fn cost_basis(&self) -> Decimal {
        self.lots
            .iter()
            .filter(|l| !l.original_units.is_zero())
            .map(|l| l.cost * l.remaining / l.original_units)
            .sum()
    }
}
