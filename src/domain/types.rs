//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - built once by the generator and read everywhere else
//! - serialized into the JSON report
//! - reused by the terminal plots and the TUI

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Covariate point at which the stress test is evaluated.
pub const STRESS_POINT: Covariates = Covariates {
    volatility: 35.0,
    volume: 150.0,
};

/// Default sample size of the synthetic dataset.
pub const DEFAULT_SAMPLE_COUNT: usize = 1000;

/// Default seed of the synthetic dataset.
pub const DEFAULT_SEED: u64 = 2025;

/// Default number of points on the marginal-effect grid.
pub const DEFAULT_GRID_POINTS: usize = 200;

/// One row of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub trading_halts: u64,
    pub volatility: f64,
    pub volume: f64,
}

impl Observation {
    pub fn covariates(&self) -> Covariates {
        Covariates {
            volatility: self.volatility,
            volume: self.volume,
        }
    }
}

/// A covariate tuple used for prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Covariates {
    pub volatility: f64,
    pub volume: f64,
}

/// A fixed-size, read-only collection of observations.
///
/// The fingerprint is computed once at construction and identifies the rows;
/// fitted models remember it so they are never silently reused on other data.
#[derive(Debug, Clone)]
pub struct Dataset {
    rows: Vec<Observation>,
    fingerprint: u64,
}

impl Dataset {
    pub fn new(rows: Vec<Observation>) -> Self {
        let fingerprint = fingerprint_rows(&rows);
        Self { rows, fingerprint }
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn halts(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.trading_halts as f64).collect()
    }

    /// Summary statistics, or `None` for an empty dataset.
    pub fn stats(&self) -> Option<DatasetStats> {
        if self.rows.is_empty() {
            return None;
        }

        let n = self.rows.len();
        let mut halts_min = u64::MAX;
        let mut halts_max = 0u64;
        let mut volatility_min = f64::INFINITY;
        let mut volatility_max = f64::NEG_INFINITY;
        let mut volume_sum = 0.0;

        for r in &self.rows {
            halts_min = halts_min.min(r.trading_halts);
            halts_max = halts_max.max(r.trading_halts);
            volatility_min = volatility_min.min(r.volatility);
            volatility_max = volatility_max.max(r.volatility);
            volume_sum += r.volume;
        }

        let (halts_mean, halts_variance) = mean_and_variance(&self.halts());

        Some(DatasetStats {
            n_rows: n,
            halts_mean,
            halts_variance,
            halts_min,
            halts_max,
            volatility_min,
            volatility_max,
            volume_mean: volume_sum / n as f64,
        })
    }
}

/// Sample mean and sample variance (`n - 1` denominator).
///
/// The variance is `NaN` for fewer than two values.
pub fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, f64::NAN);
    }
    let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (mean, ss / (n as f64 - 1.0))
}

fn fingerprint_rows(rows: &[Observation]) -> u64 {
    let mut hasher = DefaultHasher::new();
    rows.len().hash(&mut hasher);
    for r in rows {
        r.trading_halts.hash(&mut hasher);
        r.volatility.to_bits().hash(&mut hasher);
        r.volume.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

/// Dataset summary used by the report and the plots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub n_rows: usize,
    pub halts_mean: f64,
    pub halts_variance: f64,
    pub halts_min: u64,
    pub halts_max: u64,
    pub volatility_min: f64,
    pub volatility_max: f64,
    pub volume_mean: f64,
}

/// Parameters of the data-generating process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub volatility_mean: f64,
    pub volatility_sd: f64,
    pub volume_mean: f64,
    pub volume_sd: f64,
    pub intercept: f64,
    pub beta_volatility: f64,
    pub beta_volume: f64,
    /// Negative Binomial θ. `None` draws plain Poisson counts.
    pub dispersion: Option<f64>,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            volatility_mean: 20.0,
            volatility_sd: 5.0,
            volume_mean: 100.0,
            volume_sd: 15.0,
            intercept: -2.5,
            beta_volatility: 0.08,
            beta_volume: 0.01,
            dispersion: Some(1.5),
        }
    }
}

/// Concrete fitted model kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Poisson,
    NegativeBinomial,
}

impl ModelKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Poisson => "Poisson",
            ModelKind::NegativeBinomial => "Negative Binomial",
        }
    }

    /// Number of estimated parameters for information criteria
    /// (intercept + two slopes, plus θ for the Negative Binomial).
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::Poisson => 3,
            ModelKind::NegativeBinomial => 4,
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Variance-to-mean diagnostic of the response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DispersionSummary {
    pub mean: f64,
    pub variance: f64,
    pub ratio: f64,
}

impl DispersionSummary {
    pub fn is_overdispersed(&self) -> bool {
        self.ratio > 1.0
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct StudyConfig {
    pub sample_count: usize,
    pub seed: u64,
    pub simulation: SimulationParams,
    pub grid_points: usize,
    pub stress_point: Covariates,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub json: bool,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            sample_count: DEFAULT_SAMPLE_COUNT,
            seed: DEFAULT_SEED,
            simulation: SimulationParams::default(),
            grid_points: DEFAULT_GRID_POINTS,
            stress_point: STRESS_POINT,
            plot: true,
            plot_width: 60,
            plot_height: 20,
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(y: u64, vol: f64, volume: f64) -> Observation {
        Observation {
            trading_halts: y,
            volatility: vol,
            volume,
        }
    }

    #[test]
    fn stats_on_small_dataset() {
        let ds = Dataset::new(vec![row(0, 10.0, 90.0), row(2, 20.0, 100.0), row(4, 30.0, 110.0)]);
        let stats = ds.stats().unwrap();
        assert_eq!(stats.n_rows, 3);
        assert!((stats.halts_mean - 2.0).abs() < 1e-12);
        assert!((stats.halts_variance - 4.0).abs() < 1e-12);
        assert_eq!(stats.halts_min, 0);
        assert_eq!(stats.halts_max, 4);
        assert_eq!(stats.volatility_min, 10.0);
        assert_eq!(stats.volatility_max, 30.0);
        assert!((stats.volume_mean - 100.0).abs() < 1e-12);
    }

    #[test]
    fn empty_dataset_has_no_stats() {
        assert!(Dataset::new(Vec::new()).stats().is_none());
    }

    #[test]
    fn fingerprint_tracks_row_values() {
        let a = Dataset::new(vec![row(1, 20.0, 100.0)]);
        let b = Dataset::new(vec![row(1, 20.0, 100.0)]);
        let c = Dataset::new(vec![row(2, 20.0, 100.0)]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn param_counts() {
        assert_eq!(ModelKind::Poisson.param_count(), 3);
        assert_eq!(ModelKind::NegativeBinomial.param_count(), 4);
    }
}
