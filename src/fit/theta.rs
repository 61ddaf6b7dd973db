//! Maximum-likelihood estimate of the Negative Binomial shape `θ` at fixed means.
//!
//! Newton iteration on the profile score, started at the moment estimate
//! `n / Σ (y/μ − 1)²`.

use tracing::trace;

use crate::domain::ModelKind;
use crate::error::AnalysisError;
use crate::math::{digamma, trigamma};

/// θ beyond this is treated as a diverged estimate (the data look Poisson).
pub const THETA_MAX: f64 = 1e6;

#[derive(Debug, Clone)]
pub struct ThetaConfig {
    pub max_iterations: usize,
    /// Stop once the Newton step is no larger than this.
    pub step_tolerance: f64,
}

impl Default for ThetaConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            step_tolerance: f64::EPSILON.powf(0.25),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThetaEstimate {
    pub theta: f64,
    /// `1 / sqrt(observed information)` at the estimate.
    pub std_error: f64,
    pub iterations: usize,
}

/// Estimate θ given observed counts `y` and fitted means `mu`.
pub fn theta_ml(y: &[f64], mu: &[f64], config: &ThetaConfig) -> Result<ThetaEstimate, AnalysisError> {
    let fail = |reason: String| AnalysisError::fit(ModelKind::NegativeBinomial, reason);

    if y.is_empty() || y.len() != mu.len() {
        return Err(fail(format!(
            "theta estimation needs matching, non-empty inputs (y={}, mu={})",
            y.len(),
            mu.len()
        )));
    }
    if mu.iter().any(|m| !(m.is_finite() && *m > 0.0)) {
        return Err(fail("fitted means must be positive and finite".to_string()));
    }

    let n = y.len() as f64;
    let excess: f64 = y
        .iter()
        .zip(mu)
        .map(|(&yi, &mi)| {
            let r = yi / mi - 1.0;
            r * r
        })
        .sum();
    let mut theta = n / excess;
    if !(theta.is_finite() && theta > 0.0) {
        return Err(fail("moment estimate of theta is undefined (no excess variation)".to_string()));
    }

    let mut converged = false;
    let mut iterations = 0;
    let mut previous_step = 0.0;
    let mut last_step = 0.0;
    while iterations < config.max_iterations {
        iterations += 1;
        theta = theta.abs();

        let step = score(y, mu, theta) / information(y, mu, theta);
        if !step.is_finite() {
            return Err(fail(format!("theta Newton step is not finite at theta={theta:.4e}")));
        }
        theta += step;
        previous_step = last_step;
        last_step = step;
        trace!(iteration = iterations, theta, step, "theta newton");

        if step.abs() <= config.step_tolerance {
            converged = true;
            break;
        }
        if theta > THETA_MAX {
            break;
        }
    }

    if !(theta.is_finite() && theta > 0.0) {
        return Err(fail(format!("theta estimate is not positive ({theta:.4e})")));
    }
    if theta > THETA_MAX {
        return Err(fail(format!(
            "theta diverged ({theta:.3e} > {THETA_MAX:.0e}); the data show no overdispersion"
        )));
    }
    if !converged && iterations >= 2 && last_step > 0.0 && last_step >= previous_step {
        // Growing upward steps at the cap: the likelihood keeps rising towards the Poisson limit.
        return Err(fail(format!(
            "theta diverged (still increasing after {} steps, theta={theta:.4e}); the data show no overdispersion",
            config.max_iterations
        )));
    }
    if !converged {
        return Err(fail(format!(
            "theta iteration limit reached ({} steps, theta={theta:.4})",
            config.max_iterations
        )));
    }

    let info = information(y, mu, theta);
    if !(info.is_finite() && info > 0.0) {
        return Err(fail(format!("theta information is not positive at theta={theta:.4}")));
    }

    Ok(ThetaEstimate {
        theta,
        std_error: 1.0 / info.sqrt(),
        iterations,
    })
}

/// First derivative of the log-likelihood in θ.
fn score(y: &[f64], mu: &[f64], theta: f64) -> f64 {
    let psi_theta = digamma(theta);
    y.iter()
        .zip(mu)
        .map(|(&yi, &mi)| {
            digamma(theta + yi) - psi_theta + theta.ln() + 1.0 - (theta + mi).ln() - (yi + theta) / (mi + theta)
        })
        .sum()
}

/// Negative second derivative of the log-likelihood in θ.
fn information(y: &[f64], mu: &[f64], theta: f64) -> f64 {
    let psi1_theta = trigamma(theta);
    y.iter()
        .zip(mu)
        .map(|(&yi, &mi)| {
            let s = mi + theta;
            -trigamma(theta + yi) + psi1_theta - 1.0 / theta + 2.0 / s - (yi + theta) / (s * s)
        })
        .sum()
}
