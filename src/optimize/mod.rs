//! Long-only mean-variance optimizers.
//!
//! All finders share one constraint set: weights in `[0, 1]` summing to 1.
//! Each solve is independent, so a failed one never affects another.
//!
//! Minimizing risk is minimizing the variance `wᵀ Σ w`, a convex quadratic,
//! so the frontier and the minimum-variance portfolio are a single
//! active-set QP each. The tangency portfolio is the same QP after scaling
//! weights by the excess return; only when no asset beats the risk-free rate
//! does it fall back to SQP on the Sharpe ratio itself.
//!
//! - [`efficient_frontier`]: minimum risk for each target on a linear grid
//!   of returns between the lowest and highest asset mean.
//! - [`max_sharpe_portfolio`]: the tangency portfolio.
//! - [`min_variance_portfolio`]: the global minimum-risk portfolio.

mod objective;
mod qp;
mod sqp;

use std::collections::BTreeMap;

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::config::EngineConfig;
use crate::stats::Statistics;
use crate::types::Weights;

use objective::{MIN_RISK, NegativeSharpe};
use qp::QpError;
use sqp::{SqpOptions, UPPER};

/// Tolerance on the equality constraints of a returned solution.
const FEASIBILITY_TOL: f64 = 1e-6;

/// Why a single solve produced no portfolio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SolveError {
    /// Target return outside what long-only, fully invested weights reach.
    #[error("target return is not reachable with long-only weights")]
    Infeasible,
    /// Iteration budget exhausted, or the result violates the constraints.
    #[error("solver did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },
    /// Objective or gradient was not finite (e.g. zero portfolio risk).
    #[error("objective is not finite at the current weights")]
    NonFinite,
    /// No step along the search direction reduced the objective.
    #[error("line search failed to reduce the objective")]
    LineSearch,
}

impl From<QpError> for SolveError {
    fn from(e: QpError) -> Self {
        match e {
            QpError::MaxIterations { iterations } => SolveError::NotConverged { iterations },
            QpError::Singular => SolveError::NonFinite,
        }
    }
}

/// One solved portfolio: realized return, risk and Sharpe ratio.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrontierPoint {
    #[cfg_attr(feature = "serde", serde(rename = "return"))]
    pub expected_return: f64,
    pub risk: f64,
    #[cfg_attr(feature = "serde", serde(rename = "sharpe"))]
    pub sharpe_ratio: f64,
    pub weights: Weights,
}

/// Outcome of one grid point of the frontier.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrontierAttempt {
    pub target_return: f64,
    pub outcome: Result<FrontierPoint, SolveError>,
}

/// Global minimum-variance weights and their risk.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MinVariancePortfolio {
    pub weights: Weights,
    pub risk: f64,
}

/// Everything one optimization run produces.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptimizationResult {
    /// Successfully solved grid points, in increasing target return.
    pub efficient_frontier: Vec<FrontierPoint>,
    /// Every grid point with its outcome, including skipped ones.
    pub attempts: Vec<FrontierAttempt>,
    pub max_sharpe_portfolio: Option<FrontierPoint>,
    pub min_variance_portfolio: Option<MinVariancePortfolio>,
    pub symbols: Vec<String>,
    pub mean_returns: BTreeMap<String, f64>,
    pub risk_free_rate: f64,
}

impl OptimizationResult {
    /// Grid points that were skipped, with the reason.
    pub fn skipped(&self) -> impl Iterator<Item = (f64, SolveError)> + '_ {
        self.attempts
            .iter()
            .filter_map(|a| a.outcome.as_ref().err().map(|e| (a.target_return, *e)))
    }
}

/// Linearly spaced target returns from the lowest to the highest mean,
/// both ends included.
pub fn target_grid(mean_returns: &DVector<f64>, num_portfolios: usize) -> Vec<f64> {
    if mean_returns.is_empty() || num_portfolios == 0 {
        return Vec::new();
    }
    let lo = mean_returns.min();
    let hi = mean_returns.max();
    if num_portfolios == 1 {
        return vec![lo];
    }
    let step = (hi - lo) / (num_portfolios - 1) as f64;
    let mut grid: Vec<f64> = (0..num_portfolios).map(|i| lo + step * i as f64).collect();
    grid[num_portfolios - 1] = hi;
    grid
}

/// Minimum-risk portfolio earning exactly `target_return`.
pub fn efficient_portfolio(
    stats: &Statistics,
    target_return: f64,
    risk_free_rate: f64,
) -> Result<FrontierPoint, SolveError> {
    let mu = stats.mean_returns();
    let n = mu.len();
    let seed = frontier_seed(mu, target_return).ok_or(SolveError::Infeasible)?;

    let mut eq = DMatrix::from_element(2, n, 1.0);
    eq.set_row(1, &mu.transpose());

    let (weights, iterations) = minimize_variance(stats.covariance(), &eq, seed, UPPER)?;
    let weights = clean_weights(weights);

    let realized = stats.portfolio_return(weights.as_slice());
    if (realized - target_return).abs() > FEASIBILITY_TOL * (1.0 + target_return.abs()) {
        return Err(SolveError::NotConverged { iterations });
    }
    check_budget(&weights, iterations)?;

    Ok(point(stats, weights, risk_free_rate))
}

/// Solve every point of the target grid.
///
/// With the `parallel` feature the grid is solved on the rayon pool; the
/// output order always follows the grid.
pub fn efficient_frontier(
    stats: &Statistics,
    num_portfolios: usize,
    risk_free_rate: f64,
) -> Vec<FrontierAttempt> {
    let targets = target_grid(stats.mean_returns(), num_portfolios);

    let attempt = |&target_return: &f64| {
        let outcome = efficient_portfolio(stats, target_return, risk_free_rate);
        if let Err(e) = &outcome {
            debug!("Skipping frontier target {target_return:.6}: {e}");
        }
        FrontierAttempt {
            target_return,
            outcome,
        }
    };

    #[cfg(feature = "parallel")]
    let attempts: Vec<FrontierAttempt> = {
        use rayon::prelude::*;
        targets.par_iter().map(attempt).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let attempts: Vec<FrontierAttempt> = targets.iter().map(attempt).collect();

    attempts
}

/// Tangency portfolio: weights maximizing `(w·μ - r_f) / √(wᵀ Σ w)`.
///
/// Return, risk and Sharpe ratio are recomputed from the solved weights.
/// Fails with [`SolveError::NonFinite`] when the best portfolio has no risk.
pub fn max_sharpe_portfolio(
    stats: &Statistics,
    risk_free_rate: f64,
) -> Result<FrontierPoint, SolveError> {
    let excess = stats.mean_returns().map(|m| m - risk_free_rate);
    let (weights, iterations) = if excess.max() > 0.0 {
        tangency_by_scaling(stats.covariance(), &excess)?
    } else {
        let n = stats.num_assets();
        let objective =
            NegativeSharpe::new(stats.mean_returns(), stats.covariance(), risk_free_rate);
        let sol = sqp::minimize(
            &objective,
            &DMatrix::from_element(1, n, 1.0),
            equal_weights(n),
            &SqpOptions::default(),
        )?;
        (sol.x, sol.iterations)
    };
    let weights = clean_weights(weights);
    check_budget(&weights, iterations)?;
    if stats.portfolio_risk(weights.as_slice()) <= MIN_RISK {
        return Err(SolveError::NonFinite);
    }

    Ok(point(stats, weights, risk_free_rate))
}

/// Global minimum-variance portfolio.
pub fn min_variance_portfolio(stats: &Statistics) -> Result<MinVariancePortfolio, SolveError> {
    let n = stats.num_assets();
    let (weights, iterations) = minimize_variance(
        stats.covariance(),
        &DMatrix::from_element(1, n, 1.0),
        equal_weights(n),
        UPPER,
    )?;
    let weights = clean_weights(weights);
    check_budget(&weights, iterations)?;

    let risk = stats.portfolio_risk(weights.as_slice());
    Ok(MinVariancePortfolio {
        weights: to_weights(stats, &weights),
        risk,
    })
}

/// Frontier, tangency and minimum-variance portfolios for one universe.
pub fn optimize(stats: &Statistics, config: &EngineConfig) -> OptimizationResult {
    let rf = config.risk_free_rate;
    let attempts = efficient_frontier(stats, config.num_portfolios, rf);
    let efficient_frontier = attempts
        .iter()
        .filter_map(|a| a.outcome.as_ref().ok().cloned())
        .collect();

    let max_sharpe = max_sharpe_portfolio(stats, rf)
        .inspect_err(|e| debug!("No tangency portfolio: {e}"))
        .ok();
    let min_variance = min_variance_portfolio(stats)
        .inspect_err(|e| debug!("No minimum-variance portfolio: {e}"))
        .ok();

    OptimizationResult {
        efficient_frontier,
        attempts,
        max_sharpe_portfolio: max_sharpe,
        min_variance_portfolio: min_variance,
        symbols: stats.symbols().to_vec(),
        mean_returns: stats.mean_return_map(),
        risk_free_rate: rf,
    }
}

/// Minimize `½ xᵀ Σ x` over `0 ≤ x ≤ upper` and `eq · x = eq · x0`, starting
/// from the feasible `x0`. Returns the solution and the QP iteration count.
fn minimize_variance(
    cov: &DMatrix<f64>,
    eq: &DMatrix<f64>,
    x0: DVector<f64>,
    upper: f64,
) -> Result<(DVector<f64>, usize), SolveError> {
    let x0 = x0.map(|v| v.clamp(0.0, upper));
    let target = eq * &x0;
    let g = cov * &x0;
    let lo = -&x0;
    let hi = x0.map(|v| upper - v);

    let sol = qp::solve(cov, &g, eq, &lo, &hi)?;
    let mut x = (x0 + sol.p).map(|v| v.clamp(0.0, upper));
    qp::restore_equalities(eq, &target, &mut x, 0.0, upper);
    Ok((x, sol.iterations))
}

/// With a positive excess return available, the tangency weights are `y / Σy`
/// for the `y ≥ 0` minimizing `yᵀ Σ y` subject to `(μ - r_f) · y = 1`.
fn tangency_by_scaling(
    cov: &DMatrix<f64>,
    excess: &DVector<f64>,
) -> Result<(DVector<f64>, usize), SolveError> {
    let n = excess.len();
    let k = excess.imax();
    let mut y0 = DVector::zeros(n);
    y0[k] = 1.0 / excess[k];
    let eq = DMatrix::from_row_slice(1, n, excess.as_slice());

    let (y, iterations) = minimize_variance(cov, &eq, y0, f64::INFINITY)?;
    let total = y.sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(SolveError::NonFinite);
    }
    Ok((y / total, iterations))
}

fn equal_weights(n: usize) -> DVector<f64> {
    DVector::from_element(n, 1.0 / n as f64)
}

/// Feasible starting point for a return target.
///
/// Moves from equal weights toward the highest- (or lowest-) return asset
/// until the target is met. `None` when the target is out of reach.
fn frontier_seed(mu: &DVector<f64>, target_return: f64) -> Option<DVector<f64>> {
    if !target_return.is_finite() {
        return None;
    }
    let n = mu.len();
    let eq = equal_weights(n);
    let base = mu.mean();
    if (target_return - base).abs() <= 1e-12 * (1.0 + base.abs()) {
        return Some(eq);
    }

    let k = if target_return > base { mu.imax() } else { mu.imin() };
    let t = (target_return - base) / (mu[k] - base);
    if !t.is_finite() || !(0.0..=1.0 + 1e-12).contains(&t) {
        return None;
    }
    let t = t.min(1.0);

    let mut w = eq * (1.0 - t);
    w[k] += t;
    Some(w)
}

/// Snap round-off outside `[0, 1]` back onto the bounds.
fn clean_weights(x: DVector<f64>) -> DVector<f64> {
    x.map(|v| v.clamp(sqp::LOWER, sqp::UPPER))
}

fn check_budget(weights: &DVector<f64>, iterations: usize) -> Result<(), SolveError> {
    if (weights.sum() - 1.0).abs() > FEASIBILITY_TOL {
        return Err(SolveError::NotConverged { iterations });
    }
    Ok(())
}

fn to_weights(stats: &Statistics, w: &DVector<f64>) -> Weights {
    Weights::new(stats.symbols().to_vec(), w.iter().copied().collect())
}

fn point(stats: &Statistics, weights: DVector<f64>, risk_free_rate: f64) -> FrontierPoint {
    let perf = stats.portfolio_performance(weights.as_slice(), risk_free_rate);
    FrontierPoint {
        expected_return: perf.expected_return,
        risk: perf.risk,
        sharpe_ratio: perf.sharpe,
        weights: to_weights(stats, &weights),
    }
}
