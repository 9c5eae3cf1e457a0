//! How close a held portfolio sits to the tangency portfolio.

use std::fmt;

use crate::error::{Error, Result};
use crate::optimize::OptimizationResult;
use crate::stats::Statistics;
use crate::types::{Weights, weight_map};

/// Risk floor used in the current portfolio's Sharpe ratio.
pub const MIN_SHARPE_RISK: f64 = 0.01;

/// Scores below this recommend rebalancing.
pub const REBALANCE_SCORE: f64 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EfficiencyRating {
    NeedsImprovement,
    Fair,
    Good,
    Excellent,
}

impl EfficiencyRating {
    pub fn from_score(score: f64) -> Self {
        if score > 0.9 {
            Self::Excellent
        } else if score > 0.7 {
            Self::Good
        } else if score > 0.5 {
            Self::Fair
        } else {
            Self::NeedsImprovement
        }
    }
}

impl fmt::Display for EfficiencyRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::NeedsImprovement => "Needs Improvement",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EfficiencyReport {
    pub current_return: f64,
    pub current_risk: f64,
    pub current_sharpe: f64,
    /// Tangency Sharpe ratio the score is measured against, if any.
    pub optimal_sharpe: Option<f64>,
    /// `current_sharpe / optimal_sharpe`, capped at 1; 0 without a positive
    /// tangency Sharpe ratio.
    pub efficiency_score: f64,
    pub rating: EfficiencyRating,
    pub should_rebalance: bool,
    /// Current weights in universe order; absent symbols hold 0.
    pub weights: Weights,
}

/// Score `current` weights against the tangency portfolio of `optimization`.
///
/// Weights are used as given (not renormalized). `stats` must describe the
/// same universe `optimization` was solved on.
///
/// # Errors
///
/// [`Error::InvalidWeights`] if a symbol is outside the universe.
pub fn analyze_efficiency<S: AsRef<str>>(
    stats: &Statistics,
    optimization: &OptimizationResult,
    current: &[(S, f64)],
    risk_free_rate: f64,
) -> Result<EfficiencyReport> {
    let symbols = stats.symbols();
    let map = weight_map(current);
    if let Some(unknown) = map.keys().find(|s| !symbols.iter().any(|u| u == *s)) {
        return Err(Error::InvalidWeights(format!(
            "{unknown} is not in the optimized universe"
        )));
    }

    let values: Vec<f64> = symbols
        .iter()
        .map(|s| map.get(s.as_str()).copied().unwrap_or(0.0))
        .collect();

    let current_return = stats.portfolio_return(&values);
    let current_risk = stats.portfolio_risk(&values);
    let current_sharpe = (current_return - risk_free_rate) / current_risk.max(MIN_SHARPE_RISK);

    let optimal_sharpe = optimization
        .max_sharpe_portfolio
        .as_ref()
        .map(|p| p.sharpe_ratio);
    let efficiency_score = match optimal_sharpe {
        Some(opt) if opt > 0.0 => (current_sharpe / opt).min(1.0),
        _ => 0.0,
    };

    Ok(EfficiencyReport {
        current_return,
        current_risk,
        current_sharpe,
        optimal_sharpe,
        efficiency_score,
        rating: EfficiencyRating::from_score(efficiency_score),
        should_rebalance: efficiency_score < REBALANCE_SCORE,
        weights: Weights::new(symbols.to_vec(), values),
    })
}
