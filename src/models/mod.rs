//! Fitted count-model representation.
//!
//! Models are a small sum type so that selection, plotting and prediction code
//! can stay generic over the Poisson / Negative Binomial variants.

pub mod model;

pub use model::*;
