//! Numeric views derived from a fitted model.
//!
//! These are renderer-agnostic: the ASCII panels, the TUI charts and the JSON
//! report all consume the same points.

use serde::Serialize;

use crate::domain::{Covariates, Dataset};
use crate::error::AnalysisError;
use crate::models::FittedModel;

/// Two-sided 95% normal quantile.
pub const Z_95: f64 = 1.96;

/// Fewest points that span the volatility range.
pub const MIN_GRID_POINTS: usize = 2;

/// One point of the marginal-effect curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarginalEffectPoint {
    pub volatility: f64,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Predicted halts across the observed volatility range, volume held fixed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginalEffectView {
    pub volume_held: f64,
    pub points: Vec<MarginalEffectPoint>,
}

/// Fitted mean against observed count for one row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationPoint {
    pub predicted: f64,
    pub observed: f64,
}

/// Prediction with a 95% confidence band built on the link scale.
///
/// The band is `exp(η ± 1.96·se)`, so it is asymmetric around `exp(η)` and
/// always ordered.
pub fn predict_with_band(model: &FittedModel, point: Covariates) -> Result<(f64, f64, f64), AnalysisError> {
    let eta = model.checked_link(point)?;
    let se = model.link_standard_error(point);
    let predicted = eta.exp();
    let lower = (eta - Z_95 * se).exp();
    let upper = (eta + Z_95 * se).exp();
    if !upper.is_finite() {
        return Err(AnalysisError::Prediction {
            volatility: point.volatility,
            volume: point.volume,
            reason: format!("upper confidence bound overflows (eta={eta:.3}, se={se:.3})"),
        });
    }
    Ok((predicted, lower, upper))
}

/// Marginal effect of volatility on expected halts.
///
/// `grid_points` volatility values are spaced evenly over the dataset's
/// `[min, max]` volatility; volume is held at the dataset mean.
pub fn marginal_effect(
    model: &FittedModel,
    dataset: &Dataset,
    grid_points: usize,
) -> Result<MarginalEffectView, AnalysisError> {
    model.ensure_trained_on(dataset)?;

    let stats = dataset.stats().ok_or_else(|| AnalysisError::Prediction {
        volatility: f64::NAN,
        volume: f64::NAN,
        reason: "marginal effect needs a non-empty dataset".to_string(),
    })?;
    let volume_held = stats.volume_mean;
    let (lo, hi) = (stats.volatility_min, stats.volatility_max);

    if grid_points < MIN_GRID_POINTS {
        return Err(AnalysisError::Prediction {
            volatility: f64::NAN,
            volume: volume_held,
            reason: format!("the marginal-effect grid needs at least {MIN_GRID_POINTS} points, got {grid_points}"),
        });
    }
    let n = grid_points;
    let mut points = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let volatility = lo + u * (hi - lo);
        let (predicted, lower, upper) = predict_with_band(
            model,
            Covariates {
                volatility,
                volume: volume_held,
            },
        )?;
        points.push(MarginalEffectPoint {
            volatility,
            predicted,
            lower,
            upper,
        });
    }

    Ok(MarginalEffectView { volume_held, points })
}

/// Fitted mean and observed count for every row of the dataset.
pub fn calibration(model: &FittedModel, dataset: &Dataset) -> Result<Vec<CalibrationPoint>, AnalysisError> {
    model.ensure_trained_on(dataset)?;
    dataset
        .rows()
        .iter()
        .map(|r| {
            Ok(CalibrationPoint {
                predicted: model.predict_response(r.covariates())?,
                observed: r.trading_halts as f64,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::generate_dataset;
    use crate::domain::{ModelKind, SimulationParams};
    use crate::fit::{IrlsConfig, fit_negative_binomial};
    use crate::models::model::tests::toy_model;

    fn fitted() -> (Dataset, FittedModel) {
        let ds = generate_dataset(600, 99, &SimulationParams::default()).unwrap();
        let model = fit_negative_binomial(&ds, None, &IrlsConfig::default()).unwrap();
        (ds, model)
    }

    #[test]
    fn marginal_effect_grid_spans_volatility_range() {
        let (ds, model) = fitted();
        let stats = ds.stats().unwrap();
        let view = marginal_effect(&model, &ds, 200).unwrap();

        assert_eq!(view.points.len(), 200);
        assert_eq!(view.points[0].volatility, stats.volatility_min);
        assert!((view.points[199].volatility - stats.volatility_max).abs() < 1e-9);
        assert!((view.volume_held - stats.volume_mean).abs() < 1e-12);
        for w in view.points.windows(2) {
            assert!(w[1].volatility > w[0].volatility);
        }
    }

    #[test]
    fn band_contains_prediction() {
        let (ds, model) = fitted();
        let view = marginal_effect(&model, &ds, 200).unwrap();
        for p in &view.points {
            assert!(p.lower <= p.predicted && p.predicted <= p.upper, "{p:?}");
            assert!(p.lower > 0.0);
        }
    }

    #[test]
    fn degenerate_grid_is_rejected() {
        let (ds, model) = fitted();
        for n in [0, 1] {
            let err = marginal_effect(&model, &ds, n).unwrap_err();
            assert!(matches!(err, AnalysisError::Prediction { .. }), "{err}");
        }
        assert_eq!(marginal_effect(&model, &ds, 2).unwrap().points.len(), 2);
    }

    #[test]
    fn calibration_has_one_point_per_row() {
        let (ds, model) = fitted();
        let cal = calibration(&model, &ds).unwrap();
        assert_eq!(cal.len(), ds.len());
        for (c, r) in cal.iter().zip(ds.rows()) {
            assert_eq!(c.observed, r.trading_halts as f64);
            assert!(c.predicted > 0.0);
        }
    }

    #[test]
    fn views_reject_a_foreign_dataset() {
        let (_, model) = fitted();
        let other = generate_dataset(600, 100, &SimulationParams::default()).unwrap();
        assert!(matches!(
            calibration(&model, &other),
            Err(AnalysisError::DatasetMismatch { .. })
        ));
        assert!(matches!(
            marginal_effect(&model, &other, 10),
            Err(AnalysisError::DatasetMismatch { .. })
        ));
    }

    #[test]
    fn band_is_symmetric_on_the_link_scale() {
        let m = toy_model(ModelKind::Poisson, [0.0, 0.1, 0.0], 0.0);
        let p = Covariates {
            volatility: 10.0,
            volume: 0.0,
        };
        let (pred, lo, hi) = predict_with_band(&m, p).unwrap();
        assert!(((pred / lo).ln() - (hi / pred).ln()).abs() < 1e-12);
    }
}
