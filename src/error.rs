//! Error types.
//!
//! - `AnalysisError` is raised by the statistical core (generation, fitting,
//!   prediction) and carries enough context to reproduce the failure.
//! - `AppError` is the binary boundary: a message plus a process exit code.

use thiserror::Error;

use crate::domain::ModelKind;

/// Failures of the count-regression pipeline.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// Invalid generator input (e.g. `n = 0`), raised before any fitting.
    #[error("generation failed (n={n}, seed={seed}): {reason}")]
    Generation { n: usize, seed: u64, reason: String },

    /// A regression did not converge or produced an undefined dispersion.
    #[error("{model} fit failed: {reason}")]
    FitFailure { model: ModelKind, reason: String },

    /// Covariates outside the numerically stable range of the log link.
    #[error("prediction failed at volatility={volatility}, volume={volume}: {reason}")]
    Prediction {
        volatility: f64,
        volume: f64,
        reason: String,
    },

    /// A fitted model was paired with a dataset it was not trained on.
    #[error("model was fitted on dataset {expected:016x}, got dataset {actual:016x}")]
    DatasetMismatch { expected: u64, actual: u64 },
}

impl AnalysisError {
    pub fn fit(model: ModelKind, reason: impl Into<String>) -> Self {
        Self::FitFailure {
            model,
            reason: reason.into(),
        }
    }

    /// Process exit code used when this error reaches `main`.
    pub fn exit_code(&self) -> u8 {
        match self {
            AnalysisError::Generation { .. } => 2,
            AnalysisError::FitFailure { .. } => 3,
            AnalysisError::Prediction { .. } | AnalysisError::DatasetMismatch { .. } => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_errors_map_to_exit_codes() {
        let gen_err = AnalysisError::Generation {
            n: 0,
            seed: 2025,
            reason: "sample size must be > 0".to_string(),
        };
        let app: AppError = gen_err.into();
        assert_eq!(app.exit_code(), 2);
        assert!(app.to_string().contains("n=0"));
        assert!(app.to_string().contains("seed=2025"));

        let fit_err = AnalysisError::fit(ModelKind::NegativeBinomial, "theta diverged");
        assert_eq!(fit_err.exit_code(), 3);
        assert_eq!(
            fit_err.to_string(),
            "Negative Binomial fit failed: theta diverged"
        );

        let pred_err = AnalysisError::Prediction {
            volatility: 1e6,
            volume: 150.0,
            reason: "overflow".to_string(),
        };
        assert_eq!(AppError::from(pred_err).exit_code(), 4);
    }
}
