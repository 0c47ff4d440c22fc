//! lti_mpc - Model Predictive Control for linear time-invariant plants
//!
//! This crate predicts the output trajectory of a discrete state-space plant
//! over a finite horizon and computes, every control period, the input
//! increment minimizing a quadratic tracking-and-effort cost.

// Core modules
pub mod common;
pub mod utils;

// Algorithm modules
pub mod control;

// Re-export common types for convenience
pub use common::{Horizon, PlantModel, IncrementSolver};
pub use common::{MpcError, MpcResult};
pub use control::{ModelPredictiveController, MpcConfig, SolverKind, ControllerState};
