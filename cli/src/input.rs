//! JSON input files: prices, portfolios and weight maps.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use nanofolio::{PriceBar, PriceSeries};
use rustc_hash::FxHashSet;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Daily bars keyed by symbol, as handed over by a data provider.
///
/// ```json
/// { "AAPL": [{ "date": "2024-01-02", "close": 185.2 }, ...] }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct PricesFile {
    pub series: BTreeMap<String, Vec<PriceBar>>,
}

/// Weighted holdings together with their price history.
#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioFile {
    pub assets: Vec<Holding>,
    pub prices: PricesFile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub weight: f64,
}

/// Current and optimal weights for the rebalancing advisor.
#[derive(Debug, Clone, Deserialize)]
pub struct WeightsFile {
    pub current_weights: BTreeMap<String, f64>,
    pub optimal_weights: BTreeMap<String, f64>,
    /// Overrides the configured threshold.
    #[serde(default)]
    pub threshold: Option<f64>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path).map_err(|e| Error::InputRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(serde_json::from_str(&contents)?)
}

impl PricesFile {
    pub fn load(path: &Path) -> Result<Self> {
        let prices: Self = read_json(path)?;
        prices.validate()?;
        Ok(prices)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let prices: Self = serde_json::from_str(json)?;
        prices.validate()?;
        Ok(prices)
    }

    fn validate(&self) -> Result<()> {
        if self.series.is_empty() {
            return Err(Error::Input("no symbols in prices file".into()));
        }
        for (symbol, bars) in &self.series {
            if let Some(w) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
                return Err(Error::Input(format!(
                    "{symbol}: dates must be strictly increasing ({} after {})",
                    w[1].date, w[0].date
                )));
            }
        }
        Ok(())
    }

    /// Upper-cased series, ordered by symbol.
    pub fn to_series(&self) -> Vec<PriceSeries> {
        self.series
            .iter()
            .map(|(symbol, bars)| PriceSeries::new(symbol.trim().to_uppercase(), bars.clone()))
            .collect()
    }

    /// Last date covered by any series.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.series
            .values()
            .filter_map(|bars| bars.last().map(|b| b.date))
            .max()
    }
}

impl PortfolioFile {
    pub fn load(path: &Path) -> Result<Self> {
        let portfolio: Self = read_json(path)?;
        portfolio.validate()?;
        Ok(portfolio)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let portfolio: Self = serde_json::from_str(json)?;
        portfolio.validate()?;
        Ok(portfolio)
    }

    /// Reports every bad holding at once.
    fn validate(&self) -> Result<()> {
        if self.assets.is_empty() {
            return Err(Error::Input("portfolio has no assets".into()));
        }

        let mut problems = Vec::new();
        let mut seen = FxHashSet::default();
        for (i, h) in self.assets.iter().enumerate() {
            let symbol = h.symbol.trim().to_uppercase();
            if symbol.is_empty() {
                problems.push(format!("asset {i}: empty symbol"));
            }
            if !h.weight.is_finite() || h.weight <= 0.0 {
                problems.push(format!("asset {i}: weight must be > 0, got {}", h.weight));
            }
            if !symbol.is_empty() && !seen.insert(symbol.clone()) {
                problems.push(format!("asset {i}: duplicate symbol {symbol}"));
            }
        }
        if !problems.is_empty() {
            return Err(Error::Input(problems.join("; ")));
        }

        self.prices.validate()
    }

    /// `(SYMBOL, weight)` pairs with upper-cased symbols.
    pub fn weights(&self) -> Vec<(String, f64)> {
        self.assets
            .iter()
            .map(|h| (h.symbol.trim().to_uppercase(), h.weight))
            .collect()
    }

    /// Price series for the held symbols only.
    pub fn held_series(&self) -> Result<Vec<PriceSeries>> {
        let all = self.prices.to_series();
        self.weights()
            .into_iter()
            .map(|(symbol, _)| {
                all.iter()
                    .find(|s| s.symbol == symbol)
                    .cloned()
                    .ok_or_else(|| Error::Input(format!("no prices for {symbol}")))
            })
            .collect()
    }
}

impl WeightsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let weights: Self = read_json(path)?;
        weights.validate()?;
        Ok(weights)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let weights: Self = serde_json::from_str(json)?;
        weights.validate()?;
        Ok(weights)
    }

    fn validate(&self) -> Result<()> {
        if self.current_weights.is_empty() || self.optimal_weights.is_empty() {
            return Err(Error::Input(
                "current_weights and optimal_weights must both be non-empty".into(),
            ));
        }
        if let Some(t) = self.threshold {
            if !t.is_finite() || t < 0.0 {
                return Err(Error::Input(format!("threshold must be >= 0, got {t}")));
            }
        }
        for (name, map) in [
            ("current_weights", &self.current_weights),
            ("optimal_weights", &self.optimal_weights),
        ] {
            let mut seen = FxHashSet::default();
            for symbol in map.keys() {
                let upper = symbol.trim().to_uppercase();
                if !seen.insert(upper.clone()) {
                    return Err(Error::Input(format!("{name}: duplicate symbol {upper}")));
                }
            }
        }
        Ok(())
    }

    pub fn current(&self) -> Vec<(String, f64)> {
        upper_pairs(&self.current_weights)
    }

    pub fn optimal(&self) -> Vec<(String, f64)> {
        upper_pairs(&self.optimal_weights)
    }
}

fn upper_pairs(map: &BTreeMap<String, f64>) -> Vec<(String, f64)> {
    map.iter()
        .map(|(s, w)| (s.trim().to_uppercase(), *w))
        .collect()
}
