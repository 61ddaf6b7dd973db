//! Reporting: the run summary as a serializable value plus its text rendering.

pub mod format;

use serde::Serialize;

use crate::domain::{Dataset, DatasetStats, DispersionSummary, ModelKind, Observation};
use crate::fit::{CoefficientRow, ModelFits, Selection, coefficient_table};
use crate::models::FittedModel;
use crate::scenario::StressPrediction;

pub use format::{format_report, report_json};

/// Number of leading dataset rows shown in the report.
pub const HEAD_ROWS: usize = 5;

/// Everything printed at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct StudyReport {
    pub sample_count: usize,
    pub seed: u64,
    /// Dataset fingerprint as 16 hex digits.
    pub fingerprint: String,
    pub head: Vec<Observation>,
    pub stats: Option<DatasetStats>,
    pub dispersion: DispersionSummary,
    pub models: Vec<ModelSummary>,
    pub selected: ModelKind,
    pub aic_poisson: f64,
    pub aic_negbin: f64,
    pub aic_delta: f64,
    pub coefficients: Vec<CoefficientRow>,
    pub stress: StressPrediction,
}

/// Fit statistics of one candidate model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub model: ModelKind,
    pub log_likelihood: f64,
    pub aic: f64,
    pub deviance: f64,
    pub iterations: usize,
    pub theta: Option<f64>,
    pub theta_std_error: Option<f64>,
}

impl ModelSummary {
    pub fn from_model(model: &FittedModel) -> Self {
        let (theta, theta_std_error) = match model {
            FittedModel::Poisson(_) => (None, None),
            FittedModel::NegativeBinomial(nb) => (Some(nb.theta), Some(nb.theta_std_error)),
        };
        Self {
            model: model.kind(),
            log_likelihood: model.log_likelihood(),
            aic: model.aic(),
            deviance: model.glm().deviance,
            iterations: model.glm().iterations,
            theta,
            theta_std_error,
        }
    }
}

impl StudyReport {
    pub fn build(
        seed: u64,
        dataset: &Dataset,
        fits: &ModelFits,
        selection: &Selection,
        stress: StressPrediction,
    ) -> Self {
        Self {
            sample_count: dataset.len(),
            seed,
            fingerprint: format!("{:016x}", dataset.fingerprint()),
            head: dataset.rows().iter().take(HEAD_ROWS).copied().collect(),
            stats: dataset.stats(),
            dispersion: fits.dispersion,
            models: vec![
                ModelSummary::from_model(&fits.poisson),
                ModelSummary::from_model(&fits.negative_binomial),
            ],
            selected: selection.scores.selected,
            aic_poisson: selection.scores.aic_poisson,
            aic_negbin: selection.scores.aic_negbin,
            aic_delta: selection.scores.aic_delta,
            coefficients: coefficient_table(&selection.selected),
            stress,
        }
    }
}
