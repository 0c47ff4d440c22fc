//! Utility modules for lti_mpc

pub mod visualization;

pub use visualization::{Visualizer, SeriesStyle, colors};
