//! Controller configuration

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::{Horizon, MpcError, MpcResult};

/// Largest matrix dimension the controller is allowed to build
pub const MATRIX_MAXIMUM_SIZE: usize = 28;

/// Relative pivot size treated as zero for `f64`
pub const DEFAULT_ZERO_THRESHOLD: f64 = 1e-12;

/// How the optimal increment is computed from the tracking error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// Invert the Hessian every tick
    DirectInverse,
    /// Weighted least squares, QR factorized every tick
    LeastSquaresOnline,
    /// Weighted least squares, QR factorized once at (re)initialization
    LeastSquaresOffline,
    /// Precomputed gain from tracking error to the applied increment
    OfflineGain,
}

impl SolverKind {
    pub const ALL: [SolverKind; 4] = [
        SolverKind::DirectInverse,
        SolverKind::LeastSquaresOnline,
        SolverKind::LeastSquaresOffline,
        SolverKind::OfflineGain,
    ];
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverKind::DirectInverse => "direct_inverse",
            SolverKind::LeastSquaresOnline => "least_squares_online",
            SolverKind::LeastSquaresOffline => "least_squares_offline",
            SolverKind::OfflineGain => "offline_gain",
        };
        write!(f, "{}", name)
    }
}

/// Configuration for the MPC controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpcConfig {
    /// Prediction horizon Hp
    pub prediction_horizon: usize,
    /// Control horizon Hu (<= Hp)
    pub control_horizon: usize,
    /// Scalar tracking weight replicated along Q
    pub weight_q: f64,
    /// Scalar increment weight replicated along R
    pub weight_r: f64,
    pub solver: SolverKind,
    /// Ratio to the largest pivot at or below which a factorization pivot
    /// counts as zero (pivots are squared triangle diagonals)
    pub zero_threshold: f64,
    pub max_matrix_dim: usize,
}

impl Default for MpcConfig {
    fn default() -> Self {
        Self {
            prediction_horizon: 7,
            control_horizon: 4,
            weight_q: 1.0,
            weight_r: 1.0,
            solver: SolverKind::LeastSquaresOffline,
            zero_threshold: DEFAULT_ZERO_THRESHOLD,
            max_matrix_dim: MATRIX_MAXIMUM_SIZE,
        }
    }
}

impl MpcConfig {
    pub fn from_toml_str(text: &str) -> MpcResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> MpcResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_solver(mut self, solver: SolverKind) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_weights(mut self, weight_q: f64, weight_r: f64) -> Self {
        self.weight_q = weight_q;
        self.weight_r = weight_r;
        self
    }

    pub fn with_horizon(mut self, prediction: usize, control: usize) -> Self {
        self.prediction_horizon = prediction;
        self.control_horizon = control;
        self
    }

    pub fn horizon(&self) -> MpcResult<Horizon> {
        Horizon::new(self.prediction_horizon, self.control_horizon)
    }

    /// Check the structural constraints for a plant with `n` states,
    /// `m` inputs and `z` outputs
    pub fn validate(&self, n: usize, m: usize, z: usize) -> MpcResult<Horizon> {
        let horizon = self.horizon()?;
        let sizes = [
            ("Hp*Z", horizon.output_rows(z)),
            ("Hp*N", horizon.state_rows(n)),
            ("Hu*M", horizon.increment_rows(m)),
        ];
        for &(name, size) in sizes.iter() {
            if size > self.max_matrix_dim {
                return Err(MpcError::DimensionExceeded {
                    name,
                    size,
                    max: self.max_matrix_dim,
                });
            }
        }
        if !(self.zero_threshold.is_finite() && self.zero_threshold >= 0.0) {
            return Err(MpcError::InvalidThreshold {
                value: self.zero_threshold,
            });
        }
        Ok(horizon)
    }
}
