//! Model selection (Poisson vs Negative Binomial) by AIC.
//!
//! Each fitted model reports `AIC = 2k − 2·logLik`. The lower AIC wins; on an
//! exact tie the model with fewer parameters is kept.

use serde::Serialize;
use tracing::info;

use crate::domain::ModelKind;
use crate::fit::fitter::ModelFits;
use crate::models::FittedModel;

/// Outcome of comparing the two candidate fits.
#[derive(Debug, Clone)]
pub struct Selection {
    pub selected: FittedModel,
    pub scores: AicScores,
}

/// AIC of each candidate and the gap between them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AicScores {
    pub aic_poisson: f64,
    pub aic_negbin: f64,
    /// `AIC(Poisson) − AIC(Negative Binomial)`; positive favours the Negative Binomial.
    pub aic_delta: f64,
    pub selected: ModelKind,
}

/// Pick the model with the lower AIC.
pub fn select_by_aic(fits: &ModelFits) -> Selection {
    let selected = lower_aic(&fits.poisson, &fits.negative_binomial).clone();
    let aic_poisson = fits.poisson.aic();
    let aic_negbin = fits.negative_binomial.aic();
    let scores = AicScores {
        aic_poisson,
        aic_negbin,
        aic_delta: aic_poisson - aic_negbin,
        selected: selected.kind(),
    };

    info!(
        selected = %scores.selected,
        aic_poisson,
        aic_negbin,
        aic_delta = scores.aic_delta,
        "model selection"
    );
    Selection { selected, scores }
}

/// The lower-AIC model of the two; ties go to the one with fewer parameters.
pub fn lower_aic<'a>(a: &'a FittedModel, b: &'a FittedModel) -> &'a FittedModel {
    let (aic_a, aic_b) = (a.aic(), b.aic());
    if aic_a < aic_b {
        a
    } else if aic_b < aic_a {
        b
    } else if b.parameter_count() < a.parameter_count() {
        b
    } else {
        a
    }
}

impl Selection {
    pub fn kind(&self) -> ModelKind {
        self.selected.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DispersionSummary;
    use crate::models::model::tests::toy_model;

    fn fits(ll_poisson: f64, ll_negbin: f64) -> ModelFits {
        ModelFits {
            poisson: toy_model(ModelKind::Poisson, [0.0; 3], ll_poisson),
            negative_binomial: toy_model(ModelKind::NegativeBinomial, [0.0; 3], ll_negbin),
            dispersion: DispersionSummary {
                mean: 1.0,
                variance: 2.0,
                ratio: 2.0,
            },
        }
    }

    #[test]
    fn lower_aic_wins() {
        // AIC_p = 6 + 200 = 206, AIC_nb = 8 + 180 = 188
        let s = select_by_aic(&fits(-100.0, -90.0));
        assert_eq!(s.kind(), ModelKind::NegativeBinomial);
        assert_eq!(s.scores.aic_delta, 18.0);

        // AIC_p = 206, AIC_nb = 8 + 200 = 208
        let s = select_by_aic(&fits(-100.0, -100.0));
        assert_eq!(s.kind(), ModelKind::Poisson);
        assert_eq!(s.scores.aic_delta, -2.0);
    }

    #[test]
    fn exact_tie_keeps_the_simpler_model() {
        // AIC_p = 6 + 200 = 206, AIC_nb = 8 + 198 = 206
        let s = select_by_aic(&fits(-100.0, -99.0));
        assert_eq!(s.scores.aic_poisson, s.scores.aic_negbin);
        assert_eq!(s.kind(), ModelKind::Poisson);

        // Argument order does not matter.
        let f = fits(-100.0, -99.0);
        assert_eq!(lower_aic(&f.negative_binomial, &f.poisson).kind(), ModelKind::Poisson);
    }
}
