//! Visualizer: numeric views of the selected model and their terminal rendering.

pub mod ascii;
pub mod series;

pub use ascii::render_study_panels;
pub use series::*;
