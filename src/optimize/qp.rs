//! Primal active-set solver for convex quadratic programs over a box.
//!
//! Solves
//!
//! ```text
//! minimize   ½ pᵀ H p + gᵀ p
//! subject to A p = 0,   lo ≤ p ≤ hi
//! ```
//!
//! starting from the feasible point `p = 0` (callers guarantee
//! `lo ≤ 0 ≤ hi`; `hi` may be infinite). `H` must be positive semidefinite.
//!
//! The rows of `A` are replaced by an orthonormal basis of their span, and
//! the working set keeps them at full rank on the free variables. Steps are
//! then taken in the null space of `A_F`, so `A p = 0` holds to round-off,
//! and the equality multipliers are unique. A blocking bound is always
//! independent of the working set, so adding it keeps that invariant.
//!
//! Degenerate vertices can still make the working set cycle through zero
//! length steps. A working set seen twice without progress ends the solve at
//! the current point.

use nalgebra::{DMatrix, DVector};
use rustc_hash::FxHashSet;

/// Distance from a bound under which a variable starts on it.
const ACTIVE_TOL: f64 = 1e-14;
const STEP_TOL: f64 = 1e-13;
const MULTIPLIER_TOL: f64 = 1e-12;
/// Singular values at or below this count as rank deficiency. Equality rows
/// are orthonormal, so this is an absolute scale.
const RANK_TOL: f64 = 1e-10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Bound {
    Free,
    Lower,
    Upper,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum QpError {
    /// The working set kept changing without reaching a KKT point.
    MaxIterations { iterations: usize },
    /// A reduced system produced non-finite values.
    Singular,
}

#[derive(Clone, Debug)]
pub(crate) struct QpSolution {
    pub p: DVector<f64>,
    pub iterations: usize,
}

pub(crate) fn solve(
    h: &DMatrix<f64>,
    g: &DVector<f64>,
    a: &DMatrix<f64>,
    lo: &DVector<f64>,
    hi: &DVector<f64>,
) -> Result<QpSolution, QpError> {
    let n = g.len();
    let a = row_basis(a);
    let mut p = DVector::zeros(n);

    let mut state: Vec<Bound> = (0..n)
        .map(|i| {
            if lo[i] >= -ACTIVE_TOL {
                Bound::Lower
            } else if hi[i] <= ACTIVE_TOL {
                Bound::Upper
            } else {
                Bound::Free
            }
        })
        .collect();
    free_until_full_rank(&a, &mut state);

    let mut seen: FxHashSet<Vec<Bound>> = FxHashSet::default();
    // Set after a full step: p already minimizes the model on the working set.
    let mut on_minimum = false;
    let max_iter = 20 * (n + a.nrows()) + 50;
    for iter in 1..=max_iter {
        let done = |p: DVector<f64>| -> Result<QpSolution, QpError> {
            Ok(QpSolution { p, iterations: iter })
        };
        if !seen.insert(state.clone()) {
            return done(p);
        }

        let grad = h * &p + g;
        let free: Vec<usize> = (0..n).filter(|&i| state[i] == Bound::Free).collect();
        let step = if on_minimum {
            None
        } else {
            let z = reduced_step(h, &a, &grad, &free)?;
            (z.amax() > STEP_TOL * (1.0 + p.amax())).then_some(z)
        };

        let Some(z) = step else {
            // Stationary on the working set: check bound multipliers.
            let nu = equality_multipliers(&a, &grad, &free)?;
            let at_nu = a.transpose() * &nu;
            let tol = MULTIPLIER_TOL * (1.0 + grad.amax());

            let mut worst: Option<(usize, f64)> = None;
            for i in 0..n {
                let lambda = grad[i] + at_nu[i];
                let violation = match state[i] {
                    Bound::Free => continue,
                    Bound::Lower => -lambda,
                    Bound::Upper => lambda,
                };
                if violation > tol && worst.is_none_or(|(_, v)| violation > v) {
                    worst = Some((i, violation));
                }
            }

            match worst {
                None => return done(p),
                Some((i, _)) => {
                    state[i] = Bound::Free;
                    on_minimum = false;
                }
            }
            continue;
        };

        // Longest step along z that keeps every free variable in bounds.
        // Ties go to the lowest index.
        let mut alpha = 1.0_f64;
        let mut blocking: Option<(usize, Bound)> = None;
        for (r, &i) in free.iter().enumerate() {
            let zi = z[r];
            let (room, bound) = if zi < 0.0 {
                (lo[i] - p[i], Bound::Lower)
            } else if zi > 0.0 {
                (hi[i] - p[i], Bound::Upper)
            } else {
                continue;
            };
            let t = (room / zi).max(0.0);
            if t < alpha {
                alpha = t;
                blocking = Some((i, bound));
            }
        }

        if alpha > 0.0 {
            for (r, &i) in free.iter().enumerate() {
                p[i] += alpha * z[r];
            }
            seen.clear();
        }

        match blocking {
            Some((i, bound)) => {
                p[i] = if bound == Bound::Lower { lo[i] } else { hi[i] };
                state[i] = bound;
            }
            None => on_minimum = true,
        }
    }

    Err(QpError::MaxIterations {
        iterations: max_iter,
    })
}

/// Move the coordinates of `x` strictly inside `[lower, upper]` so that
/// `a x = b` holds again, then clamp. Used after a step was clipped to the box.
pub(crate) fn restore_equalities(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    x: &mut DVector<f64>,
    lower: f64,
    upper: f64,
) {
    let residual = b - a * &*x;
    if residual.amax() <= 1e-15 * (1.0 + b.amax()) {
        return;
    }
    let interior: Vec<usize> = (0..x.len())
        .filter(|&i| x[i] > lower && x[i] < upper)
        .collect();
    if interior.is_empty() {
        return;
    }

    let svd = a.select_columns(interior.iter()).svd(true, true);
    let eps = 1e-12 * svd.singular_values.max();
    let Ok(delta) = svd.solve(&residual, eps.max(f64::MIN_POSITIVE)) else {
        return;
    };
    if delta.iter().any(|v| !v.is_finite()) {
        return;
    }
    for (r, &i) in interior.iter().enumerate() {
        x[i] = (x[i] + delta[r]).clamp(lower, upper);
    }
}

/// Orthonormal basis of the row space of `a`, one row per basis vector.
fn row_basis(a: &DMatrix<f64>) -> DMatrix<f64> {
    let n = a.ncols();
    if a.nrows() == 0 || n == 0 {
        return DMatrix::zeros(0, n);
    }
    let svd = a.clone().svd(false, true);
    let Some(v_t) = svd.v_t else {
        return DMatrix::zeros(0, n);
    };
    let tol = RANK_TOL * svd.singular_values.max();
    let rows: Vec<usize> = (0..svd.singular_values.len())
        .filter(|&i| svd.singular_values[i] > tol)
        .collect();
    DMatrix::from_fn(rows.len(), n, |r, j| v_t[(rows[r], j)])
}

fn rank(a: &DMatrix<f64>, cols: &[usize]) -> usize {
    if cols.is_empty() || a.nrows() == 0 {
        return 0;
    }
    a.select_columns(cols.iter())
        .svd(false, false)
        .singular_values
        .iter()
        .filter(|&&s| s > RANK_TOL)
        .count()
}

/// Free bound variables, lowest index first, until the equalities have full
/// row rank on the free set.
fn free_until_full_rank(a: &DMatrix<f64>, state: &mut [Bound]) {
    let target = a.nrows();
    let mut free: Vec<usize> = (0..state.len())
        .filter(|&i| state[i] == Bound::Free)
        .collect();
    let mut current = rank(a, &free);
    for i in 0..state.len() {
        if current >= target {
            break;
        }
        if state[i] == Bound::Free {
            continue;
        }
        free.push(i);
        let next = rank(a, &free);
        if next > current {
            state[i] = Bound::Free;
            current = next;
        } else {
            free.pop();
        }
    }
}

/// Orthonormal basis of `{ z : m z = 0 }`, as columns.
fn null_space(m: &DMatrix<f64>) -> DMatrix<f64> {
    let k = m.ncols();
    let mut proj = DMatrix::identity(k, k);
    if m.nrows() > 0 {
        let svd = m.clone().svd(false, true);
        if let Some(v_t) = svd.v_t {
            for (i, &s) in svd.singular_values.iter().enumerate() {
                if s > RANK_TOL {
                    let v = v_t.row(i).transpose();
                    proj -= &v * v.transpose();
                }
            }
        }
    }
    // The projector's eigenvalues are 0 or 1.
    let eig = proj.symmetric_eigen();
    let cols: Vec<usize> = (0..k).filter(|&j| eig.eigenvalues[j] > 0.5).collect();
    eig.eigenvectors.select_columns(cols.iter())
}

/// Minimizer of the model over the null space of `A_F`, as a step in the
/// free variables.
fn reduced_step(
    h: &DMatrix<f64>,
    a: &DMatrix<f64>,
    grad: &DVector<f64>,
    free: &[usize],
) -> Result<DVector<f64>, QpError> {
    let k = free.len();
    if k == 0 {
        return Ok(DVector::zeros(0));
    }
    let basis = null_space(&a.select_columns(free.iter()));
    if basis.ncols() == 0 {
        return Ok(DVector::zeros(k));
    }

    let h_ff = h.select_rows(free.iter()).select_columns(free.iter());
    let g_f = DVector::from_iterator(k, free.iter().map(|&i| grad[i]));
    let reduced = basis.transpose() * &h_ff * &basis;
    let rhs = -(basis.transpose() * &g_f);

    let y = match reduced.clone().cholesky() {
        Some(chol) => chol.solve(&rhs),
        None => {
            // Semidefinite: flat directions carry no gradient, take the
            // minimum-norm step.
            let svd = reduced.svd(true, true);
            let eps = (1e-12 * svd.singular_values.max()).max(f64::MIN_POSITIVE);
            svd.solve(&rhs, eps).map_err(|_| QpError::Singular)?
        }
    };

    let z = basis * y;
    if z.iter().any(|v| !v.is_finite()) {
        return Err(QpError::Singular);
    }
    Ok(z)
}

/// `ν` solving `grad_F + A_Fᵀ ν = 0` in the least-squares sense.
fn equality_multipliers(
    a: &DMatrix<f64>,
    grad: &DVector<f64>,
    free: &[usize],
) -> Result<DVector<f64>, QpError> {
    let m = a.nrows();
    if m == 0 || free.is_empty() {
        return Ok(DVector::zeros(m));
    }
    let rhs = -DVector::from_iterator(free.len(), free.iter().map(|&i| grad[i]));
    let svd = a.select_columns(free.iter()).transpose().svd(true, true);
    let nu = svd.solve(&rhs, RANK_TOL).map_err(|_| QpError::Singular)?;
    if nu.iter().any(|v| !v.is_finite()) {
        return Err(QpError::Singular);
    }
    Ok(nu)
}
