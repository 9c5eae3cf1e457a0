//! One function per subcommand. Each loads its input, runs the engine and
//! returns a JSON report.

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{info, warn};
use nanofolio::Engine;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::input::{PortfolioFile, PricesFile, WeightsFile};

/// Envelope around every command's result.
#[derive(Debug, Clone, Serialize)]
pub struct Report<T: Serialize> {
    pub command: &'static str,
    pub generated_at: DateTime<Utc>,
    pub result: T,
}

impl<T: Serialize> Report<T> {
    pub fn new(command: &'static str, result: T) -> Self {
        Self {
            command,
            generated_at: Utc::now(),
            result,
        }
    }

    /// The report as a JSON value.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(Error::Serialize)
    }
}

/// Efficient frontier, tangency and minimum-variance portfolios.
pub fn optimize(engine: &Engine, prices: &Path) -> Result<serde_json::Value> {
    let prices = PricesFile::load(prices)?;
    if let Some(last) = prices.last_date() {
        info!("Prices through {last}");
    }
    let result = engine.optimize_prices(&prices.to_series())?;
    for (target, e) in result.skipped() {
        warn!("Frontier target {target:.4} skipped: {e}");
    }
    Report::new("optimize", result).to_value()
}

/// Per-asset and portfolio risk metrics.
pub fn metrics(engine: &Engine, portfolio: &Path) -> Result<serde_json::Value> {
    let portfolio = PortfolioFile::load(portfolio)?;
    let report = engine.calculate_metrics(&portfolio.held_series()?, &portfolio.weights())?;
    Report::new("metrics", report).to_value()
}

/// Rebalancing suggestions for a current/optimal weight pair.
pub fn rebalance(engine: &Engine, weights: &Path) -> Result<serde_json::Value> {
    let weights = WeightsFile::load(weights)?;
    let threshold = weights
        .threshold
        .unwrap_or(engine.config().rebalance_threshold);
    let (current, optimal) = (weights.current(), weights.optimal());
    let plan = engine.suggest_rebalancing_with_threshold(&current, &optimal, threshold);
    Report::new("rebalance", plan).to_value()
}

/// Score held weights against the optimal portfolio of their universe.
pub fn efficiency(engine: &Engine, portfolio: &Path) -> Result<serde_json::Value> {
    let portfolio = PortfolioFile::load(portfolio)?;
    let analysis = engine.analyze_efficiency(&portfolio.held_series()?, &portfolio.weights())?;
    Report::new("efficiency", analysis).to_value()
}

/// Write `value` as pretty JSON to `output`, or stdout when `None`.
pub fn emit(value: &serde_json::Value, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(Error::Serialize)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, format!("{json}\n"))?;
            info!("Wrote {}", path.display());
        }
        None => {
            let mut out = std::io::stdout().lock();
            writeln!(out, "{json}")?;
        }
    }
    Ok(())
}
