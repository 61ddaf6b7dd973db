//! Fitted count models and their shared prediction interface.
//!
//! Both variants use the same design (`[1, volatility, volume]`) and the log
//! link. The selector, the plots and the stress test only talk to
//! `FittedModel`; they never inspect which variant they hold beyond `kind()`.

use nalgebra::DMatrix;

use crate::domain::{Covariates, Dataset, ModelKind};
use crate::error::AnalysisError;

/// Number of coefficients in the design (intercept + two covariates).
pub const BETA_LEN: usize = 3;

/// Largest linear predictor that `exp` maps to a finite value.
const MAX_LINK: f64 = 709.0;

/// Coefficient names in design order.
pub const TERM_NAMES: [&str; BETA_LEN] = ["(Intercept)", "Volatility", "Volume"];

/// Fill a design row for the given covariates.
///
/// The row includes the constant term first (intercept).
pub fn fill_design_row(point: Covariates, out: &mut [f64; BETA_LEN]) {
    out[0] = 1.0;
    out[1] = point.volatility;
    out[2] = point.volume;
}

/// Build the `n × 3` design matrix of a dataset.
pub fn design_matrix(dataset: &Dataset) -> DMatrix<f64> {
    let mut x = DMatrix::<f64>::zeros(dataset.len(), BETA_LEN);
    let mut row = [0.0; BETA_LEN];
    for (i, obs) in dataset.rows().iter().enumerate() {
        fill_design_row(obs.covariates(), &mut row);
        for (j, v) in row.iter().enumerate() {
            x[(i, j)] = *v;
        }
    }
    x
}

/// Output of one converged IRLS fit (shared by both variants).
#[derive(Debug, Clone)]
pub struct GlmFit {
    /// `[intercept, volatility, volume]` on the log scale.
    pub coefficients: [f64; BETA_LEN],
    /// Unscaled coefficient covariance `(XᵀWX)⁻¹` at the solution.
    pub covariance: DMatrix<f64>,
    pub log_likelihood: f64,
    pub deviance: f64,
    pub iterations: usize,
    /// Fingerprint of the dataset the model was trained on.
    pub dataset_fingerprint: u64,
}

/// Negative Binomial fit: the GLM at the final θ plus the θ estimate.
#[derive(Debug, Clone)]
pub struct NegBinFit {
    pub glm: GlmFit,
    pub theta: f64,
    pub theta_std_error: f64,
    /// Outer (θ ↔ β) alternation count.
    pub outer_iterations: usize,
}

/// A fitted count regression.
#[derive(Debug, Clone)]
pub enum FittedModel {
    Poisson(GlmFit),
    NegativeBinomial(NegBinFit),
}

impl FittedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            FittedModel::Poisson(_) => ModelKind::Poisson,
            FittedModel::NegativeBinomial(_) => ModelKind::NegativeBinomial,
        }
    }

    pub fn glm(&self) -> &GlmFit {
        match self {
            FittedModel::Poisson(fit) => fit,
            FittedModel::NegativeBinomial(fit) => &fit.glm,
        }
    }

    pub fn coefficients(&self) -> &[f64; BETA_LEN] {
        &self.glm().coefficients
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.glm().covariance
    }

    /// Estimated θ (Negative Binomial only).
    pub fn theta(&self) -> Option<f64> {
        match self {
            FittedModel::Poisson(_) => None,
            FittedModel::NegativeBinomial(fit) => Some(fit.theta),
        }
    }

    pub fn log_likelihood(&self) -> f64 {
        self.glm().log_likelihood
    }

    pub fn parameter_count(&self) -> usize {
        self.kind().param_count()
    }

    /// `AIC = 2k - 2·logLik`.
    pub fn aic(&self) -> f64 {
        2.0 * self.parameter_count() as f64 - 2.0 * self.log_likelihood()
    }

    /// Linear predictor `η = xᵀβ`.
    pub fn predict_link(&self, point: Covariates) -> f64 {
        let mut row = [0.0; BETA_LEN];
        fill_design_row(point, &mut row);
        row.iter().zip(self.coefficients()).map(|(x, b)| x * b).sum()
    }

    /// Delta-method standard error of `η`: `sqrt(xᵀ Σ x)`.
    pub fn link_standard_error(&self, point: Covariates) -> f64 {
        let mut row = [0.0; BETA_LEN];
        fill_design_row(point, &mut row);
        let cov = self.covariance();
        let mut var = 0.0;
        for i in 0..BETA_LEN {
            for j in 0..BETA_LEN {
                var += row[i] * cov[(i, j)] * row[j];
            }
        }
        // Rounding can leave a tiny negative quadratic form.
        var.max(0.0).sqrt()
    }

    /// Mean response `exp(η)`.
    ///
    /// Fails for non-finite covariates and for links beyond the range of `exp`.
    pub fn predict_response(&self, point: Covariates) -> Result<f64, AnalysisError> {
        let eta = self.checked_link(point)?;
        Ok(eta.exp())
    }

    /// `η` after validating that `exp(η)` is finite.
    pub fn checked_link(&self, point: Covariates) -> Result<f64, AnalysisError> {
        let fail = |reason: String| AnalysisError::Prediction {
            volatility: point.volatility,
            volume: point.volume,
            reason,
        };

        if !(point.volatility.is_finite() && point.volume.is_finite()) {
            return Err(fail("covariates must be finite".to_string()));
        }
        let eta = self.predict_link(point);
        if !eta.is_finite() || eta > MAX_LINK {
            return Err(fail(format!(
                "linear predictor {eta:.3} overflows the log link ({} model)",
                self.kind()
            )));
        }
        Ok(eta)
    }

    /// Reject a dataset other than the one this model was trained on.
    pub fn ensure_trained_on(&self, dataset: &Dataset) -> Result<(), AnalysisError> {
        let expected = self.glm().dataset_fingerprint;
        let actual = dataset.fingerprint();
        if expected != actual {
            return Err(AnalysisError::DatasetMismatch { expected, actual });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A hand-built model with a diagonal covariance, for unit tests.
    pub(crate) fn toy_model(kind: ModelKind, coefficients: [f64; BETA_LEN], log_likelihood: f64) -> FittedModel {
        let glm = GlmFit {
            coefficients,
            covariance: DMatrix::from_diagonal_element(BETA_LEN, BETA_LEN, 1e-4),
            log_likelihood,
            deviance: 0.0,
            iterations: 1,
            dataset_fingerprint: 0,
        };
        match kind {
            ModelKind::Poisson => FittedModel::Poisson(glm),
            ModelKind::NegativeBinomial => FittedModel::NegativeBinomial(NegBinFit {
                glm,
                theta: 1.5,
                theta_std_error: 0.1,
                outer_iterations: 1,
            }),
        }
    }

    #[test]
    fn predict_link_and_response() {
        let m = toy_model(ModelKind::Poisson, [-2.5, 0.08, 0.01], -100.0);
        let p = Covariates {
            volatility: 20.0,
            volume: 100.0,
        };
        let eta = m.predict_link(p);
        assert!((eta - 0.1).abs() < 1e-12);
        let mu = m.predict_response(p).unwrap();
        assert!((mu - 0.1_f64.exp()).abs() < 1e-12);
    }

    #[test]
    fn aic_is_two_k_minus_two_loglik() {
        let p = toy_model(ModelKind::Poisson, [0.0; 3], -123.25);
        let nb = toy_model(ModelKind::NegativeBinomial, [0.0; 3], -120.5);
        assert_eq!(p.aic(), 2.0 * 3.0 + 2.0 * 123.25);
        assert_eq!(nb.aic(), 2.0 * 4.0 + 2.0 * 120.5);
        assert_eq!(p.parameter_count(), 3);
        assert_eq!(nb.parameter_count(), 4);
        assert_eq!(nb.theta(), Some(1.5));
        assert_eq!(p.theta(), None);
    }

    #[test]
    fn link_standard_error_uses_covariance() {
        let m = toy_model(ModelKind::Poisson, [0.0; 3], 0.0);
        let p = Covariates {
            volatility: 2.0,
            volume: 3.0,
        };
        // diag(1e-4): var = 1e-4 * (1 + 4 + 9)
        let expected = (1e-4_f64 * 14.0).sqrt();
        assert!((m.link_standard_error(p) - expected).abs() < 1e-12);
    }

    #[test]
    fn overflowing_prediction_is_an_error() {
        let m = toy_model(ModelKind::NegativeBinomial, [0.0, 1.0, 0.0], 0.0);
        let err = m
            .predict_response(Covariates {
                volatility: 1e4,
                volume: 0.0,
            })
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Prediction { volatility, .. } if volatility == 1e4));

        let err = m
            .predict_response(Covariates {
                volatility: f64::NAN,
                volume: 0.0,
            })
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Prediction { .. }));
    }

    #[test]
    fn design_matrix_has_intercept_column() {
        use crate::domain::Observation;
        let ds = Dataset::new(vec![
            Observation {
                trading_halts: 1,
                volatility: 10.0,
                volume: 90.0,
            },
            Observation {
                trading_halts: 0,
                volatility: 15.0,
                volume: 95.0,
            },
        ]);
        let x = design_matrix(&ds);
        assert_eq!(x.shape(), (2, 3));
        assert_eq!(x[(0, 0)], 1.0);
        assert_eq!(x[(1, 1)], 15.0);
        assert_eq!(x[(1, 2)], 95.0);
    }
}
