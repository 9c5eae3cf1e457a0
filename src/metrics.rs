//! Risk and return metrics for assets and weighted portfolios.
//!
//! Annual return here is the *compounded* mean daily return,
//! `(1 + mean)^252 - 1`, unlike the linear `mean * 252` used by the
//! optimizer's statistics. Sharpe ratios assume a zero risk-free rate.

use std::fmt;

use crate::error::{Error, Result};
use crate::returns::ReturnFrame;
use crate::stats::{mean, pearson, sample_std, sharpe_ratio};
use crate::types::{TRADING_DAYS, Weights};

/// Computed metrics for a daily return series.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metrics {
    /// Compounded annual return, `(1 + mean)^252 - 1`
    pub annual_return: f64,
    /// Annualized volatility, `std * √252`
    pub volatility: f64,
    /// `annual_return / volatility`, or 0 when volatility is 0
    pub sharpe_ratio: f64,
    /// Largest peak-to-trough decline as a non-positive fraction (-0.2 = 20%)
    pub max_drawdown: f64,
}

/// Metrics for the weighted portfolio series.
pub type PortfolioMetrics = Metrics;

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Annual return:   {:>8.2}%", self.annual_return * 100.0)?;
        writeln!(f, "  Volatility:      {:>8.2}%", self.volatility * 100.0)?;
        writeln!(f, "  Sharpe:          {:>8.2}", self.sharpe_ratio)?;
        writeln!(f, "  Max drawdown:    {:>8.2}%", self.max_drawdown * 100.0)
    }
}

/// Metrics for one asset plus its latest aligned price.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssetMetrics {
    pub symbol: String,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub metrics: Metrics,
    pub current_price: Option<f64>,
}

/// Pairwise Pearson correlations; `None` where a column has no variance.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CorrelationMatrix {
    pub symbols: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.symbols.iter().position(|s| s == a)?;
        let j = self.symbols.iter().position(|s| s == b)?;
        self.values[i][j]
    }
}

/// Full metrics run over one aligned universe.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsReport {
    pub individual_metrics: Vec<AssetMetrics>,
    pub portfolio_metrics: PortfolioMetrics,
    pub correlation_matrix: CorrelationMatrix,
    /// Weights actually applied, renormalized to sum to 1.
    pub weights: Weights,
    /// Symbols dropped for lacking history.
    pub dropped: Vec<String>,
}

/// Compute metrics from a series of daily simple returns.
///
/// Returns `None` if fewer than two returns are given.
pub fn compute_metrics(returns: &[f64]) -> Option<Metrics> {
    if returns.len() < 2 {
        return None;
    }

    let annual_return = (1.0 + mean(returns)).powf(TRADING_DAYS) - 1.0;
    let volatility = sample_std(returns) * TRADING_DAYS.sqrt();

    Some(Metrics {
        annual_return,
        volatility,
        sharpe_ratio: sharpe_ratio(annual_return, volatility),
        max_drawdown: max_drawdown(returns),
    })
}

/// Most negative `(cumulative - running_max) / running_max` over the series.
///
/// The cumulative series starts at the first compounded return, so a loss
/// on the very first day does not count as a drawdown. Always `<= 0`.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut equity = 1.0_f64;
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;

    for &r in returns {
        equity *= 1.0 + r;
        if equity > peak {
            peak = equity;
        }
        let dd = (equity - peak) / peak;
        if dd < max_dd {
            max_dd = dd;
        }
    }

    max_dd
}

/// Pearson correlation of every pair of columns.
pub fn correlation_matrix(frame: &ReturnFrame) -> CorrelationMatrix {
    let n = frame.num_assets();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let c = pearson(frame.column(i), frame.column(j));
            values[i][j] = c;
            values[j][i] = c;
        }
    }
    CorrelationMatrix {
        symbols: frame.symbols().to_vec(),
        values,
    }
}

/// Resolve a weight map against the frame, renormalized to sum to 1.
///
/// Symbols of the frame without a weight get 0.
///
/// # Errors
///
/// [`Error::InvalidWeights`] for symbols outside the frame, negative or
/// non-finite weights, or weights summing to zero.
pub fn normalize_weights<S: AsRef<str>>(
    frame: &ReturnFrame,
    weights: &[(S, f64)],
) -> Result<Weights> {
    let mut raw = vec![0.0; frame.num_assets()];
    for (symbol, w) in weights {
        let symbol = symbol.as_ref();
        let i = frame
            .position(symbol)
            .ok_or_else(|| Error::InvalidWeights(format!("no return history for {symbol}")))?;
        if !w.is_finite() || *w < 0.0 {
            return Err(Error::InvalidWeights(format!(
                "weight for {symbol} must be finite and >= 0, got {w}"
            )));
        }
        raw[i] += w;
    }

    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return Err(Error::InvalidWeights("weights sum to zero".into()));
    }

    Ok(Weights::new(
        frame.symbols().to_vec(),
        raw.into_iter().map(|w| w / total).collect(),
    ))
}

/// Daily return of the weighted portfolio: `Σ wᵢ · rᵢ(t)`.
///
/// Weights are resolved with [`normalize_weights`].
pub fn portfolio_returns<S: AsRef<str>>(
    frame: &ReturnFrame,
    weights: &[(S, f64)],
) -> Result<Vec<f64>> {
    let w = normalize_weights(frame, weights)?;
    Ok(weighted_sum(frame, &w))
}

fn weighted_sum(frame: &ReturnFrame, weights: &Weights) -> Vec<f64> {
    let mut out = vec![0.0; frame.num_rows()];
    for (col, w) in frame.columns().iter().zip(&weights.values) {
        for (acc, r) in out.iter_mut().zip(col) {
            *acc += w * r;
        }
    }
    out
}

/// Per-asset metrics, portfolio metrics and correlations for one frame.
pub fn analyze<S: AsRef<str>>(
    frame: &ReturnFrame,
    weights: &[(S, f64)],
) -> Result<MetricsReport> {
    let weights = normalize_weights(frame, weights)?;

    let individual_metrics = frame
        .symbols()
        .iter()
        .enumerate()
        .map(|(i, symbol)| {
            let metrics = compute_metrics(frame.column(i)).ok_or_else(|| {
                Error::InsufficientData(format!("too few returns for {symbol}"))
            })?;
            Ok(AssetMetrics {
                symbol: symbol.clone(),
                metrics,
                current_price: frame.current_price(i),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let portfolio_metrics = compute_metrics(&weighted_sum(frame, &weights))
        .ok_or_else(|| Error::InsufficientData("too few portfolio returns".into()))?;

    Ok(MetricsReport {
        individual_metrics,
        portfolio_metrics,
        correlation_matrix: correlation_matrix(frame),
        weights,
        dropped: frame.dropped().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(cols: Vec<Vec<f64>>) -> ReturnFrame {
        let symbols = (0..cols.len()).map(|i| format!("S{i}")).collect();
        ReturnFrame::from_columns(symbols, cols).unwrap()
    }

    #[test]
    fn too_few_returns() {
        assert!(compute_metrics(&[]).is_none());
        assert!(compute_metrics(&[0.01]).is_none());
    }

    #[test]
    fn compounded_annual_return() {
        // 2^-7 keeps the mean and deviations exact.
        let r = 0.0078125;
        let m = compute_metrics(&[r, r, r]).unwrap();
        let expected = (1.0 + r).powi(252) - 1.0;
        assert!((m.annual_return - expected).abs() < 1e-12 * expected);
        assert_eq!(m.volatility, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
    }

    #[test]
    fn volatility_uses_sample_std() {
        let m = compute_metrics(&[0.01, 0.03, 0.02]).unwrap();
        assert!((m.volatility - 0.01 * 252.0_f64.sqrt()).abs() < 1e-12);
        assert!((m.sharpe_ratio - m.annual_return / m.volatility).abs() < 1e-12);
    }

    #[test]
    fn max_drawdown_simple() {
        // Equity: 1.1 -> 0.88 -> 0.924; peak 1.1, trough 0.88
        let dd = max_drawdown(&[0.10, -0.20, 0.05]);
        assert!((dd + 0.2).abs() < 1e-10);
    }

    #[test]
    fn first_day_loss_is_not_a_drawdown() {
        // Cumulative series 0.9 -> 0.945 never falls below its own peak.
        assert_eq!(max_drawdown(&[-0.10, 0.05]), 0.0);
    }

    #[test]
    fn no_drawdown_when_always_up() {
        assert_eq!(max_drawdown(&[0.01, 0.02, 0.03]), 0.0);
    }

    #[test]
    fn correlation_of_mirrored_columns() {
        let f = frame(vec![
            vec![0.01, -0.02, 0.03],
            vec![-0.01, 0.02, -0.03],
            vec![0.0, 0.0, 0.0],
        ]);
        let c = correlation_matrix(&f);
        assert!((c.get("S0", "S1").unwrap() + 1.0).abs() < 1e-12);
        assert!((c.get("S0", "S0").unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(c.get("S2", "S0"), None);
        assert_eq!(c.get("S0", "nope"), None);
    }

    #[test]
    fn weights_are_renormalized() {
        let f = frame(vec![vec![0.01, 0.02], vec![0.03, 0.04]]);
        let w = normalize_weights(&f, &[("S0", 3.0), ("S1", 1.0)]).unwrap();
        assert_eq!(w.values, vec![0.75, 0.25]);
        let r = portfolio_returns(&f, &[("S0", 3.0), ("S1", 1.0)]).unwrap();
        assert!((r[0] - 0.015).abs() < 1e-15);
        assert!((r[1] - 0.025).abs() < 1e-15);
    }

    #[test]
    fn missing_weight_counts_as_zero() {
        let f = frame(vec![vec![0.01, 0.02], vec![0.03, 0.04]]);
        let w = normalize_weights(&f, &[("S1", 0.5)]).unwrap();
        assert_eq!(w.values, vec![0.0, 1.0]);
    }

    #[test]
    fn bad_weights_rejected() {
        let f = frame(vec![vec![0.01, 0.02]]);
        assert!(normalize_weights(&f, &[("X", 1.0)]).is_err());
        assert!(normalize_weights(&f, &[("S0", -1.0)]).is_err());
        assert!(normalize_weights(&f, &[("S0", f64::NAN)]).is_err());
        assert!(normalize_weights(&f, &[("S0", 0.0)]).is_err());
    }

    #[test]
    fn analyze_single_asset_matches_asset_metrics() {
        let f = frame(vec![vec![0.01, -0.02, 0.015, 0.005]]);
        let report = analyze(&f, &[("S0", 1.0)]).unwrap();
        assert_eq!(report.individual_metrics.len(), 1);
        assert_eq!(report.individual_metrics[0].metrics, report.portfolio_metrics);
        assert_eq!(report.individual_metrics[0].current_price, None);
    }

    #[test]
    fn display_format() {
        let m = compute_metrics(&[0.01, -0.005, 0.02]).unwrap();
        let s = format!("{m}");
        assert!(s.contains("Annual return:"));
        assert!(s.contains("Sharpe:"));
        assert!(s.contains("Max drawdown:"));
    }
}
