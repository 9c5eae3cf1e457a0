//! Smooth objectives over portfolio weights.

use nalgebra::{DMatrix, DVector};

/// Portfolio standard deviation at or below which the Sharpe ratio is undefined.
pub(crate) const MIN_RISK: f64 = 1e-12;

/// A twice-differentiable function of the weight vector.
pub(crate) trait Objective {
    fn value(&self, w: &DVector<f64>) -> f64;

    fn gradient(&self, w: &DVector<f64>) -> DVector<f64>;

    /// Positive-definite starting model of the Hessian at `w`.
    fn curvature(&self, w: &DVector<f64>) -> DMatrix<f64> {
        DMatrix::identity(w.len(), w.len())
    }
}

/// Negated Sharpe ratio `-(w·μ - r_f) / √(wᵀ Σ w)`.
///
/// Not finite where the portfolio has no risk.
pub(crate) struct NegativeSharpe<'a> {
    mu: &'a DVector<f64>,
    cov: &'a DMatrix<f64>,
    risk_free: f64,
}

impl<'a> NegativeSharpe<'a> {
    pub(crate) fn new(mu: &'a DVector<f64>, cov: &'a DMatrix<f64>, risk_free: f64) -> Self {
        Self { mu, cov, risk_free }
    }
}

impl Objective for NegativeSharpe<'_> {
    fn value(&self, w: &DVector<f64>) -> f64 {
        let sigma = w.dot(&(self.cov * w)).max(0.0).sqrt();
        if sigma <= MIN_RISK {
            return f64::NAN;
        }
        -(w.dot(self.mu) - self.risk_free) / sigma
    }

    fn gradient(&self, w: &DVector<f64>) -> DVector<f64> {
        let sigma_w = self.cov * w;
        let var = w.dot(&sigma_w).max(0.0);
        let sigma = var.sqrt();
        if sigma <= MIN_RISK {
            return DVector::from_element(w.len(), f64::NAN);
        }
        let excess = w.dot(self.mu) - self.risk_free;
        -(self.mu / sigma - sigma_w * (excess / (var * sigma)))
    }
}
