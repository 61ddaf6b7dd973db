//! Count-model fitting orchestration.
//!
//! Responsibilities:
//!
//! - fit the Poisson and Negative Binomial GLMs by IRLS
//! - estimate the Negative Binomial θ by maximum likelihood
//! - select between the two by AIC and tabulate Wald inference

pub mod fitter;
pub mod inference;
pub mod selection;
pub mod theta;

pub use fitter::*;
pub use inference::*;
pub use selection::*;
pub use theta::*;
