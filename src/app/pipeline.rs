//! Shared "study pipeline" logic used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! generate -> fit (Poisson, Negative Binomial) -> select by AIC -> views -> stress test
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use tracing::info;

use crate::data::generate_dataset;
use crate::domain::{Dataset, StudyConfig};
use crate::error::AnalysisError;
use crate::fit::{IrlsConfig, ModelFits, Selection, fit_models, select_by_aic};
use crate::plot::{CalibrationPoint, MarginalEffectView, calibration, marginal_effect};
use crate::report::StudyReport;
use crate::scenario::{StressPrediction, stress_test};

/// All computed outputs of a single study run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub dataset: Dataset,
    pub fits: ModelFits,
    pub selection: Selection,
    pub marginal_effect: MarginalEffectView,
    pub calibration: Vec<CalibrationPoint>,
    pub stress: StressPrediction,
    pub report: StudyReport,
}

/// Execute the full study and return the computed outputs.
pub fn run_study(config: &StudyConfig) -> Result<RunOutput, AnalysisError> {
    run_study_with(config, &IrlsConfig::default())
}

/// Execute the study with explicit fitting settings.
pub fn run_study_with(config: &StudyConfig, irls: &IrlsConfig) -> Result<RunOutput, AnalysisError> {
    // 1) Simulate the dataset.
    let dataset = generate_dataset(config.sample_count, config.seed, &config.simulation)?;

    // 2) Fit both candidates and pick one.
    let fits = fit_models(&dataset, irls)?;
    let selection = select_by_aic(&fits);

    // 3) Views of the selected model.
    let marginal_effect = marginal_effect(&selection.selected, &dataset, config.grid_points)?;
    let calibration = calibration(&selection.selected, &dataset)?;

    // 4) Stress point.
    let stress = stress_test(&selection.selected, config.stress_point)?;

    let report = StudyReport::build(config.seed, &dataset, &fits, &selection, stress);
    info!(
        n = dataset.len(),
        seed = config.seed,
        selected = %selection.kind(),
        "study complete"
    );

    Ok(RunOutput {
        dataset,
        fits,
        selection,
        marginal_effect,
        calibration,
        stress,
        report,
    })
}
