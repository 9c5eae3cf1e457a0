//! Return series builder: price series in, date-aligned daily returns out.
//!
//! Each symbol's simple returns are computed over its own consecutive bars,
//! then every column is restricted to the dates on which *all* symbols have a
//! usable return. The first bar of each series has no prior price and never
//! produces a return.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::warn;
use rustc_hash::FxHashSet;

use crate::error::{Error, Result};
use crate::types::PriceSeries;

/// Minimum aligned rows needed for a sample covariance.
pub const MIN_ROWS: usize = 2;

/// Date-indexed table of simple daily returns, one column per symbol.
///
/// Every column has the same length and shares the same date index.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnFrame {
    symbols: Vec<String>,
    dates: Vec<NaiveDate>,
    columns: Vec<Vec<f64>>,
    current_prices: Vec<Option<f64>>,
    dropped: Vec<String>,
}

impl ReturnFrame {
    /// Align the price series of several symbols into one return frame.
    ///
    /// Symbols with fewer than two prices are dropped (and listed in
    /// [`dropped`](Self::dropped)); a repeated symbol keeps its first series.
    /// Non-finite returns (e.g. a previous close of zero) count as missing.
    ///
    /// # Errors
    ///
    /// [`Error::InsufficientData`] if no symbol is usable or fewer than
    /// [`MIN_ROWS`] dates survive alignment.
    pub fn from_prices(series: &[PriceSeries]) -> Result<Self> {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut symbols = Vec::new();
        let mut per_symbol: Vec<(BTreeMap<NaiveDate, f64>, BTreeMap<NaiveDate, f64>)> =
            Vec::new();
        let mut dropped = Vec::new();

        for s in series {
            if !seen.insert(s.symbol.as_str()) {
                warn!("Ignoring repeated price series for {}", s.symbol);
                continue;
            }
            if s.bars.len() < 2 {
                warn!(
                    "Dropping {}: {} price(s), need at least 2",
                    s.symbol,
                    s.bars.len()
                );
                dropped.push(s.symbol.clone());
                continue;
            }

            let closes: BTreeMap<NaiveDate, f64> =
                s.bars.iter().map(|b| (b.date, b.close)).collect();
            let returns: BTreeMap<NaiveDate, f64> = s
                .bars
                .windows(2)
                .filter_map(|pair| {
                    let r = pair[1].close / pair[0].close - 1.0;
                    r.is_finite().then_some((pair[1].date, r))
                })
                .collect();

            symbols.push(s.symbol.clone());
            per_symbol.push((returns, closes));
        }

        if symbols.is_empty() {
            return Err(Error::InsufficientData(
                "no symbol has at least two prices".into(),
            ));
        }

        let dates: Vec<NaiveDate> = per_symbol[0]
            .0
            .keys()
            .copied()
            .filter(|d| per_symbol.iter().all(|(r, _)| r.contains_key(d)))
            .collect();

        if dates.len() < MIN_ROWS {
            return Err(Error::InsufficientData(format!(
                "{} aligned return date(s) across {} symbol(s), need at least {MIN_ROWS}",
                dates.len(),
                symbols.len()
            )));
        }

        let last = dates[dates.len() - 1];
        let columns = per_symbol
            .iter()
            .map(|(r, _)| dates.iter().map(|d| r[d]).collect())
            .collect();
        let current_prices = per_symbol
            .iter()
            .map(|(_, closes)| closes.get(&last).copied())
            .collect();

        Ok(Self {
            symbols,
            dates,
            columns,
            current_prices,
            dropped,
        })
    }

    /// Build a frame directly from return columns (no dates, no prices).
    ///
    /// # Errors
    ///
    /// [`Error::InsufficientData`] if there are no columns, the columns have
    /// different lengths, fewer than [`MIN_ROWS`] rows, or non-finite values.
    pub fn from_columns(symbols: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if symbols.is_empty() || symbols.len() != columns.len() {
            return Err(Error::InsufficientData(format!(
                "{} symbol(s) for {} column(s)",
                symbols.len(),
                columns.len()
            )));
        }
        let rows = columns[0].len();
        if columns.iter().any(|c| c.len() != rows) {
            return Err(Error::InsufficientData("columns differ in length".into()));
        }
        if rows < MIN_ROWS {
            return Err(Error::InsufficientData(format!(
                "{rows} row(s), need at least {MIN_ROWS}"
            )));
        }
        if columns.iter().flatten().any(|r| !r.is_finite()) {
            return Err(Error::InsufficientData("non-finite return".into()));
        }

        let n = symbols.len();
        Ok(Self {
            symbols,
            dates: Vec::new(),
            columns,
            current_prices: vec![None; n],
            dropped: Vec::new(),
        })
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Aligned dates; empty for frames built with [`from_columns`](Self::from_columns).
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    pub fn column(&self, i: usize) -> &[f64] {
        &self.columns[i]
    }

    /// Index of `symbol` in the frame.
    pub fn position(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// Close on the last aligned date.
    pub fn current_price(&self, i: usize) -> Option<f64> {
        self.current_prices[i]
    }

    /// Symbols left out for having too little history.
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    pub fn num_assets(&self) -> usize {
        self.symbols.len()
    }

    pub fn num_rows(&self) -> usize {
        self.columns[0].len()
    }
}
