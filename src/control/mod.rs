//! Model predictive control module
//!
//! Prediction model construction, the increment solvers and the control
//! loop driver.

pub mod config;
pub mod linalg;
pub mod mpc;
pub mod prediction;
pub mod solver;
pub mod weights;

pub use config::{MpcConfig, SolverKind, DEFAULT_ZERO_THRESHOLD, MATRIX_MAXIMUM_SIZE};
pub use mpc::{ControllerState, ModelPredictiveController};
pub use prediction::{constant_setpoint, PredictionModel, StateLifting};
pub use solver::{DirectInverseSolver, Factorization, LeastSquaresSolver, OfflineGainSolver, Solver};
pub use weights::Weights;
