//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observations and the read-only `Dataset`
//! - generator parameters (`SimulationParams`) and run configuration (`StudyConfig`)
//! - the model kinds compared by the selector

pub mod types;

pub use types::*;
