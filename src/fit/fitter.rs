//! Maximum-likelihood fitting of the two count GLMs.
//!
//! Given:
//! - the design `X = [1, volatility, volume]`
//! - the observed counts `y_i`
//!
//! we fit, with a log link:
//! - a Poisson GLM by IRLS (weights `w = μ`)
//! - a Negative Binomial GLM by alternating IRLS at fixed θ
//!   (weights `w = μ / (1 + μ/θ)`) with a profile-likelihood update of θ
//!
//! Both loops stop on a relative-change rule and give up after a bounded number
//! of iterations. A loop that does not converge is a `FitFailure`; partial
//! results are never returned.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, trace};

use crate::domain::{Dataset, DispersionSummary, ModelKind, mean_and_variance};
use crate::error::AnalysisError;
use crate::fit::theta::{ThetaConfig, ThetaEstimate, theta_ml};
use crate::math::{ln_factorial, ln_gamma, solve_weighted_least_squares};
use crate::models::{BETA_LEN, FittedModel, GlmFit, NegBinFit, design_matrix};

/// Minimum number of extra observations beyond parameter count.
const MIN_N_BUFFER: usize = 5;

/// Largest linear predictor accepted during IRLS.
const MAX_ETA: f64 = 700.0;

/// Initial mean offset (`μ = y + 0.1`) so that zero counts have a finite log.
const MU_START_OFFSET: f64 = 0.1;

/// Configuration of the IRLS loop and the θ ↔ β alternation.
#[derive(Debug, Clone)]
pub struct IrlsConfig {
    /// Maximum IRLS iterations per fit, and maximum outer alternations for
    /// the Negative Binomial.
    pub max_iterations: usize,
    /// Convergence tolerance on the relative change of deviance (IRLS) and
    /// log-likelihood (alternation).
    pub tolerance: f64,
    /// Settings of the θ Newton solver.
    pub theta: ThetaConfig,
}

impl Default for IrlsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            tolerance: 1e-8,
            theta: ThetaConfig::default(),
        }
    }
}

/// Both candidate models plus the dispersion diagnostic of the response.
#[derive(Debug, Clone)]
pub struct ModelFits {
    pub poisson: FittedModel,
    pub negative_binomial: FittedModel,
    pub dispersion: DispersionSummary,
}

/// Fit the Poisson and the Negative Binomial models to `dataset`.
///
/// The Negative Binomial alternation is warm-started from the Poisson
/// coefficients.
pub fn fit_models(dataset: &Dataset, config: &IrlsConfig) -> Result<ModelFits, AnalysisError> {
    let dispersion = dispersion_summary(dataset);
    info!(
        mean = dispersion.mean,
        variance = dispersion.variance,
        ratio = dispersion.ratio,
        "response dispersion"
    );

    let poisson = fit_poisson(dataset, config)?;
    let start = *poisson.coefficients();
    let negative_binomial = fit_negative_binomial(dataset, Some(&start), config)?;

    Ok(ModelFits {
        poisson,
        negative_binomial,
        dispersion,
    })
}

/// `variance / mean` of the observed counts (sample variance, `n - 1`).
pub fn dispersion_summary(dataset: &Dataset) -> DispersionSummary {
    let (mean, variance) = mean_and_variance(&dataset.halts());
    DispersionSummary {
        mean,
        variance,
        ratio: variance / mean,
    }
}

/// Fit the log-link Poisson GLM.
pub fn fit_poisson(dataset: &Dataset, config: &IrlsConfig) -> Result<FittedModel, AnalysisError> {
    let kind = ModelKind::Poisson;
    let y = validate_response(dataset, kind)?;
    let x = design_matrix(dataset);

    let out = irls(&x, &y, Family::Poisson, None, config)?;
    let log_likelihood = Family::Poisson.log_likelihood(&y, &out.mu);
    if !log_likelihood.is_finite() {
        return Err(AnalysisError::fit(kind, "log-likelihood is not finite"));
    }

    let model = FittedModel::Poisson(GlmFit {
        coefficients: out.beta,
        covariance: out.covariance,
        log_likelihood,
        deviance: out.deviance,
        iterations: out.iterations,
        dataset_fingerprint: dataset.fingerprint(),
    });
    info!(
        model = %kind,
        log_likelihood,
        aic = model.aic(),
        iterations = out.iterations,
        "fitted model"
    );
    Ok(model)
}

/// Fit the log-link Negative Binomial GLM with θ estimated by maximum likelihood.
///
/// `start` seeds the coefficients (normally the Poisson estimate); without it a
/// Poisson IRLS pass is run first.
pub fn fit_negative_binomial(
    dataset: &Dataset,
    start: Option<&[f64; BETA_LEN]>,
    config: &IrlsConfig,
) -> Result<FittedModel, AnalysisError> {
    let kind = ModelKind::NegativeBinomial;
    let y = validate_response(dataset, kind)?;
    let x = design_matrix(dataset);

    let mut beta = match start {
        Some(b) => *b,
        None => {
            irls(&x, &y, Family::Poisson, None, config)
                .map_err(|e| AnalysisError::fit(kind, format!("Poisson start failed: {e}")))?
                .beta
        }
    };

    let mu_start = mean_from_coefficients(&x, &beta)
        .ok_or_else(|| AnalysisError::fit(kind, "starting coefficients overflow the log link"))?;
    let mut theta = theta_ml(&y, &mu_start, &config.theta)?.theta;
    let mut ll_prev = Family::NegativeBinomial { theta }.log_likelihood(&y, &mu_start);

    let mut last: Option<(IrlsOutput, ThetaEstimate, f64)> = None;
    let mut converged = false;
    let mut outer = 0;

    while outer < config.max_iterations {
        outer += 1;

        let out = irls(&x, &y, Family::NegativeBinomial { theta }, Some(&beta), config)?;
        let est = theta_ml(&y, &out.mu, &config.theta)?;
        let ll = Family::NegativeBinomial { theta: est.theta }.log_likelihood(&y, &out.mu);
        if !ll.is_finite() {
            return Err(AnalysisError::fit(kind, "log-likelihood is not finite"));
        }

        let rel_ll = (ll - ll_prev).abs() / (ll.abs() + 0.1);
        let rel_theta = (est.theta - theta).abs() / theta;
        debug!(
            outer,
            theta = est.theta,
            theta_steps = est.iterations,
            log_likelihood = ll,
            rel_ll,
            rel_theta,
            "negative binomial alternation"
        );

        beta = out.beta;
        theta = est.theta;
        ll_prev = ll;
        last = Some((out, est, ll));

        if rel_ll < config.tolerance && rel_theta < config.tolerance.sqrt() {
            converged = true;
            break;
        }
    }

    let Some((out, est, log_likelihood)) = last else {
        return Err(AnalysisError::fit(kind, "no alternation was run (max_iterations = 0)"));
    };
    if !converged {
        return Err(AnalysisError::fit(
            kind,
            format!(
                "theta/beta alternation did not converge in {} iterations (theta={:.4})",
                config.max_iterations, est.theta
            ),
        ));
    }

    // The last IRLS pass weighted with the previous θ.
    let covariance = covariance_at(&x, &y, &out.mu, Family::NegativeBinomial { theta: est.theta })?;

    let model = FittedModel::NegativeBinomial(NegBinFit {
        glm: GlmFit {
            coefficients: out.beta,
            covariance,
            log_likelihood,
            deviance: out.deviance,
            iterations: out.iterations,
            dataset_fingerprint: dataset.fingerprint(),
        },
        theta: est.theta,
        theta_std_error: est.std_error,
        outer_iterations: outer,
    });
    info!(
        model = %kind,
        theta = est.theta,
        log_likelihood,
        aic = model.aic(),
        outer_iterations = outer,
        "fitted model"
    );
    Ok(model)
}

/// Response family of one IRLS pass (log link in both cases).
#[derive(Debug, Clone, Copy, PartialEq)]
enum Family {
    Poisson,
    NegativeBinomial { theta: f64 },
}

impl Family {
    fn kind(self) -> ModelKind {
        match self {
            Family::Poisson => ModelKind::Poisson,
            Family::NegativeBinomial { .. } => ModelKind::NegativeBinomial,
        }
    }

    /// IRLS weight `1 / (V(μ) g'(μ)²)` with `g'(μ) = 1/μ`.
    fn working_weight(self, mu: f64) -> f64 {
        match self {
            Family::Poisson => mu,
            Family::NegativeBinomial { theta } => mu / (1.0 + mu / theta),
        }
    }

    fn unit_deviance(self, y: f64, mu: f64) -> f64 {
        match self {
            Family::Poisson => 2.0 * (y_log_y_over(y, mu) - (y - mu)),
            Family::NegativeBinomial { theta } => {
                2.0 * (y_log_y_over(y, mu) - (y + theta) * ((y + theta) / (mu + theta)).ln())
            }
        }
    }

    fn deviance(self, y: &[f64], mu: &[f64]) -> f64 {
        y.iter().zip(mu).map(|(&yi, &mi)| self.unit_deviance(yi, mi)).sum()
    }

    /// Full log-likelihood including the `-ln y!` terms.
    fn log_likelihood(self, y: &[f64], mu: &[f64]) -> f64 {
        match self {
            Family::Poisson => y
                .iter()
                .zip(mu)
                .map(|(&yi, &mi)| y_log(yi, mi) - mi - ln_factorial(yi))
                .sum(),
            Family::NegativeBinomial { theta } => {
                let ln_gamma_theta = ln_gamma(theta);
                y.iter()
                    .zip(mu)
                    .map(|(&yi, &mi)| {
                        ln_gamma(theta + yi) - ln_gamma_theta - ln_factorial(yi)
                            + theta * (theta / (theta + mi)).ln()
                            + y_log(yi, mi / (theta + mi))
                    })
                    .sum()
            }
        }
    }
}

/// `y · ln(y / μ)`, with the `y = 0` limit of zero.
fn y_log_y_over(y: f64, mu: f64) -> f64 {
    if y > 0.0 { y * (y / mu).ln() } else { 0.0 }
}

/// `y · ln(p)`, with the `y = 0` limit of zero.
fn y_log(y: f64, p: f64) -> f64 {
    if y > 0.0 { y * p.ln() } else { 0.0 }
}

#[derive(Debug, Clone)]
struct IrlsOutput {
    beta: [f64; BETA_LEN],
    covariance: DMatrix<f64>,
    mu: Vec<f64>,
    deviance: f64,
    iterations: usize,
}

/// Iteratively reweighted least squares for a log-link count GLM.
///
/// Each step regresses the working response `z = η + (y − μ)/μ` on `X` with
/// weights from the family, and stops once
/// `|D − D_old| / (|D| + 0.1) < tolerance`.
fn irls(
    x: &DMatrix<f64>,
    y: &[f64],
    family: Family,
    start: Option<&[f64; BETA_LEN]>,
    config: &IrlsConfig,
) -> Result<IrlsOutput, AnalysisError> {
    let kind = family.kind();

    let (mut eta, mut mu): (Vec<f64>, Vec<f64>) = match start {
        Some(beta) => {
            let mu = mean_from_coefficients(x, beta)
                .ok_or_else(|| AnalysisError::fit(kind, "starting coefficients overflow the log link"))?;
            (mu.iter().map(|m| m.ln()).collect(), mu)
        }
        None => {
            let mu: Vec<f64> = y.iter().map(|&yi| yi + MU_START_OFFSET).collect();
            (mu.iter().map(|m| m.ln()).collect(), mu)
        }
    };

    let mut deviance_old = family.deviance(y, &mu);
    let mut beta = [0.0; BETA_LEN];
    let mut deviance = deviance_old;
    let mut converged = false;
    let mut iteration = 0;

    while iteration < config.max_iterations {
        iteration += 1;

        let (z, w) = working_response_and_weights(y, &eta, &mu, family);
        let solution = solve_weighted_least_squares(x, &DVector::from_vec(z), &DVector::from_vec(w))
            .ok_or_else(|| {
                AnalysisError::fit(
                    kind,
                    format!("singular or ill-conditioned design (XᵀWX) at IRLS iteration {iteration}"),
                )
            })?;

        for (j, b) in beta.iter_mut().enumerate() {
            *b = solution.beta[j];
        }

        let eta_new = x * &solution.beta;
        if eta_new.iter().any(|e| !e.is_finite() || *e > MAX_ETA) {
            return Err(AnalysisError::fit(
                kind,
                format!("linear predictor diverged at IRLS iteration {iteration}"),
            ));
        }
        eta = eta_new.iter().copied().collect();
        mu = eta.iter().map(|e| e.exp()).collect();

        deviance = family.deviance(y, &mu);
        if !deviance.is_finite() {
            return Err(AnalysisError::fit(
                kind,
                format!("deviance is not finite at IRLS iteration {iteration}"),
            ));
        }

        let rel_change = (deviance - deviance_old).abs() / (deviance.abs() + 0.1);
        trace!(model = %kind, iteration, deviance, rel_change, "irls step");

        if rel_change < config.tolerance {
            converged = true;
            break;
        }
        deviance_old = deviance;
    }

    if !converged {
        return Err(AnalysisError::fit(
            kind,
            format!(
                "IRLS did not converge in {} iterations (deviance={deviance:.6})",
                config.max_iterations
            ),
        ));
    }

    // Covariance at the converged mean rather than at the last step's input.
    let covariance = covariance_at(x, y, &mu, family)?;

    Ok(IrlsOutput {
        beta,
        covariance,
        mu,
        deviance,
        iterations: iteration,
    })
}

/// `(XᵀWX)⁻¹` with the family weights evaluated at `mu`.
fn covariance_at(x: &DMatrix<f64>, y: &[f64], mu: &[f64], family: Family) -> Result<DMatrix<f64>, AnalysisError> {
    let eta: Vec<f64> = mu.iter().map(|m| m.ln()).collect();
    let (z, w) = working_response_and_weights(y, &eta, mu, family);
    solve_weighted_least_squares(x, &DVector::from_vec(z), &DVector::from_vec(w))
        .map(|solution| solution.xtwx_inv)
        .ok_or_else(|| AnalysisError::fit(family.kind(), "singular information matrix at the solution"))
}

fn working_response_and_weights(y: &[f64], eta: &[f64], mu: &[f64], family: Family) -> (Vec<f64>, Vec<f64>) {
    let z = eta
        .iter()
        .zip(y)
        .zip(mu)
        .map(|((&e, &yi), &mi)| e + (yi - mi) / mi)
        .collect();
    let w = mu.iter().map(|&mi| family.working_weight(mi)).collect();
    (z, w)
}

/// `μ = exp(Xβ)`, or `None` if any entry overflows.
fn mean_from_coefficients(x: &DMatrix<f64>, beta: &[f64; BETA_LEN]) -> Option<Vec<f64>> {
    let eta = x * DVector::from_column_slice(beta);
    if eta.iter().any(|e| !e.is_finite() || *e > MAX_ETA) {
        return None;
    }
    Some(eta.iter().map(|e| e.exp()).collect())
}

/// Check that the dataset can identify `kind` and return the response as `f64`.
fn validate_response(dataset: &Dataset, kind: ModelKind) -> Result<Vec<f64>, AnalysisError> {
    let n = dataset.len();
    let k = kind.param_count();
    if n < k + MIN_N_BUFFER {
        return Err(AnalysisError::fit(
            kind,
            format!("underdetermined: n={n} < k+{MIN_N_BUFFER}={}", k + MIN_N_BUFFER),
        ));
    }
    if dataset
        .rows()
        .iter()
        .any(|r| !(r.volatility.is_finite() && r.volume.is_finite()))
    {
        return Err(AnalysisError::fit(kind, "covariates contain non-finite values"));
    }

    let y = dataset.halts();
    if y.iter().all(|&v| v == 0.0) {
        return Err(AnalysisError::fit(kind, "response is identically zero"));
    }
    Ok(y)
}
