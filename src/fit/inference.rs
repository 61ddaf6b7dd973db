//! Wald inference for fitted coefficients.

use serde::Serialize;
use statrs::function::erf::erfc;

use crate::models::{BETA_LEN, FittedModel, TERM_NAMES};

/// One row of the coefficient table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientRow {
    pub term: &'static str,
    pub estimate: f64,
    pub std_error: f64,
    pub z_value: f64,
    pub p_value: f64,
}

/// Estimate, standard error, Wald z and two-sided p-value per coefficient.
pub fn coefficient_table(model: &FittedModel) -> Vec<CoefficientRow> {
    let beta = model.coefficients();
    let cov = model.covariance();
    (0..BETA_LEN)
        .map(|j| {
            let std_error = cov[(j, j)].max(0.0).sqrt();
            let z_value = beta[j] / std_error;
            CoefficientRow {
                term: TERM_NAMES[j],
                estimate: beta[j],
                std_error,
                z_value,
                p_value: pvalue_z(z_value),
            }
        })
        .collect()
}

/// Two-sided normal p-value `P(|Z| > |z|)`.
pub fn pvalue_z(z: f64) -> f64 {
    if !z.is_finite() {
        return f64::NAN;
    }
    // 2·(1 − Φ(|z|)) = erfc(|z|/√2), without cancellation in the tail.
    erfc(z.abs() / std::f64::consts::SQRT_2)
}
