//! Core types: PriceBar, PriceSeries, Weights

use std::fmt;

use chrono::NaiveDate;
use rustc_hash::FxHashMap;

/// Trading days per year used to annualize daily statistics.
pub const TRADING_DAYS: f64 = 252.0;

/// One daily observation handed over by the data-retrieval layer.
///
/// Only `close` feeds the analytics; the other fields ride along when the
/// upstream source provides them.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: f64,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub open: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub high: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub low: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub volume: Option<f64>,
}

impl PriceBar {
    /// A bar carrying only a closing price.
    pub fn close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            open: None,
            high: None,
            low: None,
            volume: None,
        }
    }
}

/// Ordered closing prices for one symbol.
///
/// Dates are expected to be strictly increasing; the upstream collaborator
/// owns that guarantee.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PriceSeries {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    /// Build a series from `(date, close)` pairs.
    pub fn from_closes(
        symbol: impl Into<String>,
        closes: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Self {
        Self::new(
            symbol,
            closes
                .into_iter()
                .map(|(date, close)| PriceBar::close(date, close))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Portfolio weights keyed by symbol, in universe order.
///
/// Every finder returns weights in `[0, 1]` summing to 1.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Weights {
    pub symbols: Vec<String>,
    pub values: Vec<f64>,
}

impl Weights {
    pub fn new(symbols: Vec<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(symbols.len(), values.len());
        Self { symbols, values }
    }

    /// Weight for `symbol`, if present.
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|i| self.values[i])
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(symbol, weight)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.symbols
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

impl fmt::Display for Weights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (symbol, w)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{symbol}={:.2}%", w * 100.0)?;
        }
        Ok(())
    }
}

/// Index a `(symbol, weight)` list by symbol, summing repeated symbols.
///
/// Non-finite weights count as 0.
pub(crate) fn weight_map<S: AsRef<str>>(weights: &[(S, f64)]) -> FxHashMap<&str, f64> {
    let mut map = FxHashMap::default();
    for (s, w) in weights {
        let w = if w.is_finite() { *w } else { 0.0 };
        *map.entry(s.as_ref()).or_insert(0.0) += w;
    }
    map
}
