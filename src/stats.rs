//! Statistics engine: annualized mean returns and covariance.
//!
//! Both moments are annualized linearly by [`TRADING_DAYS`]: the mean vector
//! and the covariance matrix are each multiplied by 252. Volatility read off
//! the diagonal therefore scales by √252.
//!
//! Also hosts the small sample-statistics helpers shared with the risk
//! metrics calculator.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::returns::ReturnFrame;
use crate::types::TRADING_DAYS;

// ---------------------------------------------------------------------------
// Sample statistics
// ---------------------------------------------------------------------------

/// Arithmetic mean. `NaN` for an empty slice.
pub fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample covariance (denominator `n - 1`). Zero when `n < 2`.
pub fn sample_covariance(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let mx = mean(&x[..n]);
    let my = mean(&y[..n]);
    x[..n]
        .iter()
        .zip(&y[..n])
        .map(|(a, b)| (a - mx) * (b - my))
        .sum::<f64>()
        / (n - 1) as f64
}

/// Sample standard deviation (denominator `n - 1`).
pub fn sample_std(xs: &[f64]) -> f64 {
    sample_covariance(xs, xs).max(0.0).sqrt()
}

/// Pearson correlation coefficient between two slices.
///
/// `None` when either side has zero variance or fewer than two points.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }

    let mean_x = mean(&x[..n]);
    let mean_y = mean(&y[..n]);

    let mut cov = 0.0_f64;
    let mut var_x = 0.0_f64;
    let mut var_y = 0.0_f64;

    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    Some((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0))
}

/// Excess return per unit of risk, defined as 0 when `risk` is not positive.
pub fn sharpe_ratio(excess_return: f64, risk: f64) -> f64 {
    if risk > 0.0 {
        excess_return / risk
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Annualized moments
// ---------------------------------------------------------------------------

/// Return, risk and Sharpe ratio of one weight vector under `(μ, Σ)`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Performance {
    pub expected_return: f64,
    pub risk: f64,
    pub sharpe: f64,
}

/// Annualized mean-return vector and covariance matrix over one universe.
///
/// Recomputed per call from a [`ReturnFrame`]; never cached.
#[derive(Clone, Debug, PartialEq)]
pub struct Statistics {
    symbols: Vec<String>,
    mean_returns: DVector<f64>,
    covariance: DMatrix<f64>,
}

impl Statistics {
    /// Annualize the first and second moments of an aligned frame.
    pub fn from_frame(frame: &ReturnFrame) -> Self {
        let n = frame.num_assets();
        let cols = frame.columns();

        let mean_returns = DVector::from_iterator(n, cols.iter().map(|c| mean(c) * TRADING_DAYS));

        let mut covariance = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let c = sample_covariance(&cols[i], &cols[j]) * TRADING_DAYS;
                covariance[(i, j)] = c;
                covariance[(j, i)] = c;
            }
        }

        Self {
            symbols: frame.symbols().to_vec(),
            mean_returns,
            covariance,
        }
    }

    /// Wrap precomputed annualized moments.
    ///
    /// # Errors
    ///
    /// [`Error::InsufficientData`] on shape mismatch, an empty universe,
    /// non-finite entries, or an asymmetric covariance.
    pub fn new(
        symbols: Vec<String>,
        mean_returns: Vec<f64>,
        covariance: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let n = symbols.len();
        if n == 0 || mean_returns.len() != n || covariance.len() != n {
            return Err(Error::InsufficientData(format!(
                "{n} symbol(s), {} mean(s), {} covariance row(s)",
                mean_returns.len(),
                covariance.len()
            )));
        }
        if covariance.iter().any(|row| row.len() != n) {
            return Err(Error::InsufficientData("covariance is not square".into()));
        }
        if mean_returns
            .iter()
            .chain(covariance.iter().flatten())
            .any(|x| !x.is_finite())
        {
            return Err(Error::InsufficientData("non-finite moment".into()));
        }

        let covariance = DMatrix::from_fn(n, n, |i, j| covariance[i][j]);
        let tol = 1e-12 * covariance.amax().max(1.0);
        if (&covariance - covariance.transpose()).amax() > tol {
            return Err(Error::InsufficientData("covariance is not symmetric".into()));
        }

        Ok(Self {
            symbols,
            mean_returns: DVector::from_vec(mean_returns),
            covariance,
        })
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn num_assets(&self) -> usize {
        self.symbols.len()
    }

    /// Annualized mean returns, in symbol order.
    pub fn mean_returns(&self) -> &DVector<f64> {
        &self.mean_returns
    }

    /// Annualized covariance matrix, in symbol order.
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Mean returns keyed by symbol.
    pub fn mean_return_map(&self) -> BTreeMap<String, f64> {
        self.symbols
            .iter()
            .cloned()
            .zip(self.mean_returns.iter().copied())
            .collect()
    }

    /// Annualized volatility of each asset (√ of the diagonal).
    pub fn volatilities(&self) -> Vec<f64> {
        self.covariance
            .diagonal()
            .iter()
            .map(|v| v.max(0.0).sqrt())
            .collect()
    }

    /// `w · μ`
    pub fn portfolio_return(&self, weights: &[f64]) -> f64 {
        weights
            .iter()
            .zip(self.mean_returns.iter())
            .map(|(w, m)| w * m)
            .sum()
    }

    /// `√(wᵀ Σ w)`
    pub fn portfolio_risk(&self, weights: &[f64]) -> f64 {
        let w = DVector::from_column_slice(weights);
        w.dot(&(&self.covariance * &w)).max(0.0).sqrt()
    }

    /// Return, risk and Sharpe ratio of `weights` against `risk_free_rate`.
    pub fn portfolio_performance(&self, weights: &[f64], risk_free_rate: f64) -> Performance {
        let expected_return = self.portfolio_return(weights);
        let risk = self.portfolio_risk(weights);
        Performance {
            expected_return,
            risk,
            sharpe: sharpe_ratio(expected_return - risk_free_rate, risk),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(cols: Vec<Vec<f64>>) -> ReturnFrame {
        let symbols = (0..cols.len()).map(|i| format!("S{i}")).collect();
        ReturnFrame::from_columns(symbols, cols).unwrap()
    }

    #[test]
    fn annualizes_linearly() {
        let f = frame(vec![vec![0.01, 0.03, 0.02]]);
        let s = Statistics::from_frame(&f);
        assert!((s.mean_returns()[0] - 0.02 * 252.0).abs() < 1e-12);
        // sample var of [0.01, 0.03, 0.02] = 1e-4
        assert!((s.covariance()[(0, 0)] - 1e-4 * 252.0).abs() < 1e-14);
        assert!((s.volatilities()[0] - (1e-4 * 252.0_f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn identical_columns_fully_correlated() {
        let col = vec![0.01, -0.02, 0.015];
        let f = frame(vec![col.clone(), col.clone()]);
        let s = Statistics::from_frame(&f);
        let c = s.covariance();
        assert_eq!(c[(0, 1)], c[(1, 0)]);
        assert_eq!(c[(0, 0)], c[(1, 1)]);
        assert_eq!(c[(0, 1)], c[(0, 0)]);
        assert!((pearson(&col, &col).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_anti_correlated() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&x, &y).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_zero_variance_is_none() {
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
        assert!(pearson(&[1.0], &[2.0]).is_none());
    }

    #[test]
    fn sharpe_guard() {
        assert_eq!(sharpe_ratio(0.1, 0.0), 0.0);
        assert_eq!(sharpe_ratio(0.1, 0.2), 0.5);
    }

    #[test]
    fn portfolio_performance_two_assets() {
        let s = Statistics::new(
            vec!["A".into(), "B".into()],
            vec![0.10, 0.20],
            vec![vec![0.04, 0.0], vec![0.0, 0.09]],
        )
        .unwrap();
        let p = s.portfolio_performance(&[0.5, 0.5], 0.02);
        assert!((p.expected_return - 0.15).abs() < 1e-12);
        // var = 0.25*0.04 + 0.25*0.09 = 0.0325
        assert!((p.risk - 0.0325_f64.sqrt()).abs() < 1e-12);
        assert!((p.sharpe - 0.13 / 0.0325_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn new_rejects_bad_shapes() {
        assert!(Statistics::new(vec!["A".into()], vec![0.1, 0.2], vec![vec![0.01]]).is_err());
        assert!(
            Statistics::new(
                vec!["A".into(), "B".into()],
                vec![0.1, 0.2],
                vec![vec![0.01, 0.002], vec![0.003, 0.02]]
            )
            .is_err()
        );
        assert!(Statistics::new(vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn mean_return_map_keys() {
        let f = frame(vec![vec![0.01, 0.03], vec![0.0, 0.02]]);
        let m = Statistics::from_frame(&f).mean_return_map();
        assert_eq!(m.len(), 2);
        assert!((m["S1"] - 0.01 * 252.0).abs() < 1e-12);
    }
}
