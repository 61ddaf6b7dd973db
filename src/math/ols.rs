//! Weighted least squares solver.
//!
//! Every IRLS step solves a small weighted regression of the form:
//!
//! ```text
//! minimize Σ w_i (z_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - We scale rows by `sqrt(w_i)` and form the normal equations `XᵀWX β = XᵀWz`.
//! - The system is solved by Cholesky. The same factorization gives `(XᵀWX)⁻¹`,
//!   which is the unscaled coefficient covariance of the fitted GLM.
//! - The parameter dimension is tiny (3 columns), so the normal equations are
//!   cheap and well within double precision for sensible designs.

use nalgebra::{DMatrix, DVector};

/// Smallest accepted ratio between the smallest and largest Cholesky pivot.
///
/// Exactly collinear columns rarely produce a zero pivot in floating point,
/// so we reject factorizations whose pivots collapse relative to the largest.
const MIN_PIVOT_RATIO: f64 = 1e-7;

/// Solution of a weighted least squares problem.
#[derive(Debug, Clone)]
pub struct WeightedSolution {
    pub beta: DVector<f64>,
    /// `(XᵀWX)⁻¹`.
    pub xtwx_inv: DMatrix<f64>,
}

/// Solve a weighted least squares problem.
///
/// Returns `None` if `XᵀWX` is singular or too ill-conditioned to factorize.
///
/// # Panics
/// Panics if `z` or `w` do not have one entry per row of `x`.
pub fn solve_weighted_least_squares(
    x: &DMatrix<f64>,
    z: &DVector<f64>,
    w: &DVector<f64>,
) -> Option<WeightedSolution> {
    let n = x.nrows();
    let p = x.ncols();
    assert_eq!(z.len(), n, "working response length must match design rows");
    assert_eq!(w.len(), n, "weights length must match design rows");

    let mut xw = DMatrix::<f64>::zeros(n, p);
    let mut zw = DVector::<f64>::zeros(n);
    for i in 0..n {
        let sw = w[i].sqrt();
        for j in 0..p {
            xw[(i, j)] = x[(i, j)] * sw;
        }
        zw[i] = z[i] * sw;
    }

    let xtwx = xw.transpose() * &xw;
    let xtwz = xw.transpose() * zw;

    let chol = xtwx.cholesky()?;

    let diag = chol.l_dirty().diagonal();
    let max_pivot = diag.iter().copied().fold(0.0_f64, f64::max);
    let min_pivot = diag.iter().copied().fold(f64::INFINITY, f64::min);
    if !(max_pivot.is_finite() && max_pivot > 0.0) || min_pivot / max_pivot < MIN_PIVOT_RATIO {
        return None;
    }

    let beta = chol.solve(&xtwz);
    let xtwx_inv = chol.inverse();

    if beta.iter().all(|v| v.is_finite()) && xtwx_inv.iter().all(|v| v.is_finite()) {
        Some(WeightedSolution { beta, xtwx_inv })
    } else {
        None
    }
}
