//! Common types used throughout lti_mpc

use nalgebra::{SMatrix, SVector};

use crate::common::error::{MpcError, MpcResult};

/// Discrete, linear, time-invariant plant
///
/// ```text
/// x(k+1) = A x(k) + B u(k)    x: N x 1, u: M x 1
/// z(k)   = C x(k)             z: Z x 1
/// ```
///
/// Shapes are part of the type, so a mismatched A/B/C triple does not compile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantModel<const N: usize, const M: usize, const Z: usize> {
    pub a: SMatrix<f64, N, N>,
    pub b: SMatrix<f64, N, M>,
    pub c: SMatrix<f64, Z, N>,
}

impl<const N: usize, const M: usize, const Z: usize> PlantModel<N, M, Z> {
    pub fn new(a: SMatrix<f64, N, N>, b: SMatrix<f64, N, M>, c: SMatrix<f64, Z, N>) -> Self {
        Self { a, b, c }
    }

    /// Propagate the state one sample forward
    pub fn step(&self, x: &SVector<f64, N>, u: &SVector<f64, M>) -> SVector<f64, N> {
        self.a * x + self.b * u
    }

    /// Measured output for a state
    pub fn output(&self, x: &SVector<f64, N>) -> SVector<f64, Z> {
        self.c * x
    }

    pub const fn state_dim(&self) -> usize {
        N
    }

    pub const fn input_dim(&self) -> usize {
        M
    }

    pub const fn output_dim(&self) -> usize {
        Z
    }
}

/// Prediction (Hp) and control (Hu) horizon lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizon {
    prediction: usize,
    control: usize,
}

impl Horizon {
    /// Create a horizon, enforcing `1 <= control <= prediction`
    pub fn new(prediction: usize, control: usize) -> MpcResult<Self> {
        if prediction == 0 || control == 0 || control > prediction {
            return Err(MpcError::InvalidHorizon { prediction, control });
        }
        Ok(Self { prediction, control })
    }

    /// Prediction horizon Hp
    pub fn prediction(&self) -> usize {
        self.prediction
    }

    /// Control horizon Hu
    pub fn control(&self) -> usize {
        self.control
    }

    /// Rows of the lifted output trajectory (Hp * Z)
    pub fn output_rows(&self, z: usize) -> usize {
        self.prediction * z
    }

    /// Rows of the lifted state trajectory (Hp * N)
    pub fn state_rows(&self, n: usize) -> usize {
        self.prediction * n
    }

    /// Length of the planned increment sequence (Hu * M)
    pub fn increment_rows(&self, m: usize) -> usize {
        self.control * m
    }
}
