//! Diagonal tracking (Q) and effort (R) weights of the MPC objective

use nalgebra::{DMatrix, DVector};

use crate::common::{Horizon, MpcError, MpcResult};

/// Diagonal weight matrices over the lifted trajectories
///
/// `Q` is `(Hp*Z) x (Hp*Z)`, `R` is `(Hu*M) x (Hu*M)`. The square roots of
/// the diagonals are kept alongside for the least-squares formulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    q: DMatrix<f64>,
    r: DMatrix<f64>,
    sqrt_q: DVector<f64>,
    sqrt_r: DVector<f64>,
}

impl Weights {
    /// Replicate one scalar along each diagonal
    pub fn uniform(
        weight_q: f64,
        weight_r: f64,
        horizon: Horizon,
        output_dim: usize,
        input_dim: usize,
    ) -> MpcResult<Self> {
        Self::from_diagonals(&vec![weight_q; output_dim], &vec![weight_r; input_dim], horizon)
    }

    /// Replicate a per-output and a per-input weight along the block
    /// diagonal of the horizon
    pub fn from_diagonals(q_per_output: &[f64], r_per_input: &[f64], horizon: Horizon) -> MpcResult<Self> {
        for &value in q_per_output {
            check_weight("weight_q", value)?;
        }
        for &value in r_per_input {
            check_weight("weight_r", value)?;
        }

        let q_diag = DVector::from_iterator(
            horizon.output_rows(q_per_output.len()),
            (0..horizon.prediction()).flat_map(|_| q_per_output.iter().copied()),
        );
        let r_diag = DVector::from_iterator(
            horizon.increment_rows(r_per_input.len()),
            (0..horizon.control()).flat_map(|_| r_per_input.iter().copied()),
        );

        Ok(Self {
            q: DMatrix::from_diagonal(&q_diag),
            r: DMatrix::from_diagonal(&r_diag),
            sqrt_q: q_diag.map(f64::sqrt),
            sqrt_r: r_diag.map(f64::sqrt),
        })
    }

    /// Tracking-error weight `Q`
    pub fn q(&self) -> &DMatrix<f64> {
        &self.q
    }

    /// Control-increment weight `R`
    pub fn r(&self) -> &DMatrix<f64> {
        &self.r
    }

    pub fn sqrt_q_diagonal(&self) -> &DVector<f64> {
        &self.sqrt_q
    }

    pub fn sqrt_r_diagonal(&self) -> &DVector<f64> {
        &self.sqrt_r
    }
}

fn check_weight(name: &'static str, value: f64) -> MpcResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(MpcError::InvalidWeight { name, value });
    }
    Ok(())
}
