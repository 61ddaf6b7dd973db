//! Synthetic trading-halt sample generation.
//!
//! Each row draws volatility and volume from independent normals, builds the
//! log-linear mean `log μ = β0 + β1·volatility + β2·volume`, and draws the halt
//! count from a Negative Binomial with mean `μ` and shape `θ` (as a
//! Gamma–Poisson mixture), or from a Poisson when no dispersion is set.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Gamma, Normal, Poisson};
use tracing::debug;

use crate::domain::{Dataset, Observation, SimulationParams};
use crate::error::AnalysisError;

/// Generate a dataset of `n` rows from `params` using a generator seeded with `seed`.
///
/// The RNG is created here and advanced monotonically through the whole sample,
/// so the output is reproducible for a fixed `(n, seed, params)`.
pub fn generate_dataset(n: usize, seed: u64, params: &SimulationParams) -> Result<Dataset, AnalysisError> {
    let invalid = |reason: String| AnalysisError::Generation { n, seed, reason };

    if n == 0 {
        return Err(invalid("sample size must be > 0".to_string()));
    }

    let volatility = Normal::new(params.volatility_mean, params.volatility_sd)
        .map_err(|e| invalid(format!("volatility distribution: {e}")))?;
    let volume = Normal::new(params.volume_mean, params.volume_sd)
        .map_err(|e| invalid(format!("volume distribution: {e}")))?;

    if let Some(theta) = params.dispersion {
        if !(theta.is_finite() && theta > 0.0) {
            return Err(invalid(format!("dispersion must be positive and finite, got {theta}")));
        }
    }
    for (name, v) in [
        ("intercept", params.intercept),
        ("beta_volatility", params.beta_volatility),
        ("beta_volume", params.beta_volume),
    ] {
        if !v.is_finite() {
            return Err(invalid(format!("{name} must be finite, got {v}")));
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(n);

    for i in 0..n {
        let vol = volatility.sample(&mut rng);
        let vlm = volume.sample(&mut rng);

        let log_mu = params.intercept + params.beta_volatility * vol + params.beta_volume * vlm;
        let mu = log_mu.exp();
        if !(mu.is_finite() && mu > 0.0) {
            return Err(invalid(format!("row {i}: latent mean exp({log_mu:.3}) is not usable")));
        }

        let halts = draw_count(&mut rng, mu, params.dispersion)
            .map_err(|reason| invalid(format!("row {i}: {reason}")))?;

        rows.push(Observation {
            trading_halts: halts,
            volatility: vol,
            volume: vlm,
        });
    }

    let dataset = Dataset::new(rows);
    debug!(
        n,
        seed,
        fingerprint = %format!("{:016x}", dataset.fingerprint()),
        "generated synthetic dataset"
    );
    Ok(dataset)
}

/// Draw one count with mean `mu`.
///
/// NB(μ, θ) is sampled as `λ ~ Gamma(θ, μ/θ)`, `y ~ Poisson(λ)`, giving
/// `Var(y) = μ + μ²/θ`.
fn draw_count(rng: &mut StdRng, mu: f64, dispersion: Option<f64>) -> Result<u64, String> {
    let lambda = match dispersion {
        Some(theta) => {
            let gamma = Gamma::new(theta, mu / theta).map_err(|e| format!("gamma mixing: {e}"))?;
            gamma.sample(rng)
        }
        None => mu,
    };

    // A Gamma draw can underflow to exactly zero for small shapes.
    if lambda <= 0.0 {
        return Ok(0);
    }

    let poisson = Poisson::new(lambda).map_err(|e| format!("poisson draw: {e}"))?;
    let y: f64 = poisson.sample(rng);
    Ok(y as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mean_and_variance;

    #[test]
    fn returns_exactly_n_non_negative_rows() {
        let ds = generate_dataset(250, 7, &SimulationParams::default()).unwrap();
        assert_eq!(ds.len(), 250);
        assert!(ds.rows().iter().all(|r| r.volatility.is_finite() && r.volume.is_finite()));
    }

    #[test]
    fn same_seed_is_reproducible() {
        let params = SimulationParams::default();
        let a = generate_dataset(500, 2025, &params).unwrap();
        let b = generate_dataset(500, 2025, &params).unwrap();
        assert_eq!(a.rows(), b.rows());
        assert_eq!(a.fingerprint(), b.fingerprint());

        let sa = a.stats().unwrap();
        let sb = b.stats().unwrap();
        assert!((sa.halts_mean - sb.halts_mean).abs() < 1e-12);
        assert!((sa.halts_variance - sb.halts_variance).abs() < 1e-12);
    }

    #[test]
    fn different_seeds_differ() {
        let params = SimulationParams::default();
        let a = generate_dataset(200, 1, &params).unwrap();
        let b = generate_dataset(200, 2, &params).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn zero_rows_is_a_generation_error() {
        let err = generate_dataset(0, 2025, &SimulationParams::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::Generation { n: 0, seed: 2025, .. }));
    }

    #[test]
    fn invalid_dispersion_is_rejected() {
        let params = SimulationParams {
            dispersion: Some(0.0),
            ..SimulationParams::default()
        };
        let err = generate_dataset(10, 1, &params).unwrap_err();
        assert!(matches!(err, AnalysisError::Generation { .. }));
    }

    #[test]
    fn covariate_moments_match_parameters() {
        let ds = generate_dataset(5000, 11, &SimulationParams::default()).unwrap();
        let vol: Vec<f64> = ds.rows().iter().map(|r| r.volatility).collect();
        let vlm: Vec<f64> = ds.rows().iter().map(|r| r.volume).collect();
        let (vol_mean, vol_var) = mean_and_variance(&vol);
        let (vlm_mean, vlm_var) = mean_and_variance(&vlm);
        assert!((vol_mean - 20.0).abs() < 0.5, "volatility mean {vol_mean}");
        assert!((vol_var.sqrt() - 5.0).abs() < 0.5, "volatility sd {}", vol_var.sqrt());
        assert!((vlm_mean - 100.0).abs() < 1.5, "volume mean {vlm_mean}");
        assert!((vlm_var.sqrt() - 15.0).abs() < 1.5, "volume sd {}", vlm_var.sqrt());
    }

    #[test]
    fn negative_binomial_draws_are_overdispersed() {
        // Constant mean isolates the mixing variance: Var = μ + μ²/θ.
        let params = SimulationParams {
            volatility_sd: 1e-9,
            volume_sd: 1e-9,
            intercept: 1.0,
            beta_volatility: 0.0,
            beta_volume: 0.0,
            dispersion: Some(1.5),
            ..SimulationParams::default()
        };
        let ds = generate_dataset(20_000, 3, &params).unwrap();
        let (mean, var) = mean_and_variance(&ds.halts());
        let mu = 1.0_f64.exp();
        let expected_var = mu + mu * mu / 1.5;
        assert!((mean - mu).abs() < 0.1, "mean {mean} vs {mu}");
        assert!((var - expected_var).abs() / expected_var < 0.1, "var {var} vs {expected_var}");
    }
}
