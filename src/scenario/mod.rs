//! Stress evaluation: the selected model's prediction at one fixed covariate point.

use serde::Serialize;
use tracing::info;

use crate::domain::Covariates;
use crate::error::AnalysisError;
use crate::models::FittedModel;
use crate::plot::series::predict_with_band;

/// Expected halts at the stress point with a 95% confidence band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StressPrediction {
    pub covariates: Covariates,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Evaluate `model` at `point`.
///
/// Only prediction errors can occur here (non-finite covariates, overflow of
/// the log link).
pub fn stress_test(model: &FittedModel, point: Covariates) -> Result<StressPrediction, AnalysisError> {
    let (predicted, lower, upper) = predict_with_band(model, point)?;
    info!(
        model = %model.kind(),
        volatility = point.volatility,
        volume = point.volume,
        predicted,
        "stress prediction"
    );
    Ok(StressPrediction {
        covariates: point,
        predicted,
        lower,
        upper,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ModelKind, STRESS_POINT};
    use crate::models::model::tests::toy_model;
    use approx::assert_relative_eq;

    #[test]
    fn stress_prediction_is_exp_of_link() {
        let m = toy_model(ModelKind::NegativeBinomial, [-2.5, 0.08, 0.01], 0.0);
        let s = stress_test(&m, STRESS_POINT).unwrap();
        // -2.5 + 0.08·35 + 0.01·150 = 1.8
        assert_relative_eq!(s.predicted, 1.8_f64.exp(), max_relative = 1e-12);
        assert!(s.lower < s.predicted && s.predicted < s.upper);
        assert_eq!(s.covariates, STRESS_POINT);
    }

    #[test]
    fn overflow_is_a_prediction_error() {
        let m = toy_model(ModelKind::Poisson, [0.0, 100.0, 0.0], 0.0);
        let err = stress_test(&m, STRESS_POINT).unwrap_err();
        assert!(matches!(err, AnalysisError::Prediction { volume, .. } if volume == 150.0));
    }
}
