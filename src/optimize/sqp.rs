//! Feasible-start sequential quadratic programming over long-only weights.
//!
//! Every iterate satisfies the linear equalities and the `[0, 1]` box: the QP
//! subproblem only proposes steps in the null space of the equalities and
//! inside the box, and the Armijo line search shortens but never leaves that
//! set. Round-off from clamping a trial point is projected back onto the
//! equalities. The Hessian model starts from [`Objective::curvature`] and is refined
//! with Powell-damped BFGS updates so it stays positive definite.

use nalgebra::{DMatrix, DVector};

use super::objective::Objective;
use super::qp;
use super::SolveError;

pub(crate) const LOWER: f64 = 0.0;
pub(crate) const UPPER: f64 = 1.0;

const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 40;

/// Stopping rules for [`minimize`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct SqpOptions {
    pub max_iter: usize,
    /// Converged once the QP step's largest component falls below this.
    pub step_tol: f64,
    /// Relative objective change treated as stagnation.
    pub ftol: f64,
}

impl Default for SqpOptions {
    fn default() -> Self {
        Self {
            max_iter: 200,
            step_tol: 1e-9,
            ftol: 1e-14,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct SqpSolution {
    pub x: DVector<f64>,
    pub iterations: usize,
}

/// Minimize `objective` subject to `eq · x = eq · x0` and `0 ≤ x ≤ 1`.
///
/// `x0` must already be feasible.
pub(crate) fn minimize<O: Objective>(
    objective: &O,
    eq: &DMatrix<f64>,
    x0: DVector<f64>,
    opts: &SqpOptions,
) -> Result<SqpSolution, SolveError> {
    let mut x = x0.map(|v| v.clamp(LOWER, UPPER));
    let target = eq * &x;
    let mut f = objective.value(&x);
    let mut g = objective.gradient(&x);
    if !f.is_finite() || g.iter().any(|v| !v.is_finite()) {
        return Err(SolveError::NonFinite);
    }
    let mut b = objective.curvature(&x);

    for iter in 1..=opts.max_iter {
        let done = |x: DVector<f64>| -> Result<SqpSolution, SolveError> {
            Ok(SqpSolution {
                x,
                iterations: iter,
            })
        };

        let lo = x.map(|v| (LOWER - v).min(0.0));
        let hi = x.map(|v| (UPPER - v).max(0.0));
        let d = match qp::solve(&b, &g, eq, &lo, &hi) {
            Ok(sol) => sol.p,
            Err(_) => {
                // The quasi-Newton model may have drifted; restart it once.
                b = objective.curvature(&x);
                qp::solve(&b, &g, eq, &lo, &hi)
                    .map_err(|_| SolveError::NotConverged { iterations: iter })?
                    .p
            }
        };

        if d.amax() <= opts.step_tol {
            return done(x);
        }
        let slope = g.dot(&d);
        if slope >= 0.0 {
            // No descent left at working precision.
            return done(x);
        }

        let mut alpha = 1.0_f64;
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let mut trial = (&x + &d * alpha).map(|v| v.clamp(LOWER, UPPER));
            qp::restore_equalities(eq, &target, &mut trial, LOWER, UPPER);
            let f_trial = objective.value(&trial);
            if f_trial.is_finite() && f_trial <= f + ARMIJO * alpha * slope {
                accepted = Some((trial, f_trial));
                break;
            }
            alpha *= 0.5;
        }
        let Some((x_new, f_new)) = accepted else {
            if d.amax() <= opts.step_tol.sqrt() {
                return done(x);
            }
            return Err(SolveError::LineSearch);
        };

        let g_new = objective.gradient(&x_new);
        if g_new.iter().any(|v| !v.is_finite()) {
            return Err(SolveError::NonFinite);
        }

        let s = &x_new - &x;
        let y = &g_new - &g;
        damped_bfgs_update(&mut b, &s, &y);

        let stalled = (f - f_new).abs() <= opts.ftol * (1.0 + f_new.abs())
            && s.amax() <= opts.step_tol.sqrt();

        x = x_new;
        f = f_new;
        g = g_new;

        if stalled {
            return done(x);
        }
    }

    Err(SolveError::NotConverged {
        iterations: opts.max_iter,
    })
}

/// Powell-damped BFGS update; keeps `b` symmetric positive definite.
fn damped_bfgs_update(b: &mut DMatrix<f64>, s: &DVector<f64>, y: &DVector<f64>) {
    let bs = &*b * s;
    let sbs = s.dot(&bs);
    if sbs <= f64::EPSILON * s.norm_squared() {
        return;
    }
    let sy = s.dot(y);
    let theta = if sy >= 0.2 * sbs {
        1.0
    } else {
        0.8 * sbs / (sbs - sy)
    };
    let r = y * theta + &bs * (1.0 - theta);
    let sr = s.dot(&r);
    if sr <= 0.0 {
        return;
    }
    *b -= &bs * bs.transpose() / sbs;
    *b += &r * r.transpose() / sr;
}
