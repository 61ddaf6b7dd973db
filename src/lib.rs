//! `halt-glm` library crate.
//!
//! The binary (`halts`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the CLI report and the TUI share one pipeline
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod logging;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod scenario;
pub mod tui;
