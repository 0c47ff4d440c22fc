//! Precomputed error-to-increment gain
//!
//! ```text
//! H     = CTHETA' * Q * CTHETA + R
//! XI    = H^-1 * CTHETA' * Q
//! XI_DU = XI(0..M, :)
//! dU    = XI_DU * Err
//! ```

use log::warn;
use nalgebra::{DMatrix, DVector};

use crate::common::{IncrementSolver, MpcError, MpcResult};
use crate::control::linalg::checked_inverse;
use crate::control::{PredictionModel, SolverKind, Weights};

/// Solver whose per-tick cost is one `M x (Hp*Z)` matrix-vector product
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineGainSolver {
    gain: Option<DMatrix<f64>>,
}

impl OfflineGainSolver {
    pub fn new(model: &PredictionModel, weights: &Weights, zero_threshold: f64) -> Self {
        let ctheta = model.ctheta();
        let ctheta_t_q = ctheta.transpose() * weights.q();
        let hessian = &ctheta_t_q * ctheta + weights.r();

        let gain = match checked_inverse(&hessian, zero_threshold, "Hessian") {
            Ok(hessian_inv) => {
                let xi = hessian_inv * ctheta_t_q;
                Some(xi.rows(0, model.input_dim()).into_owned())
            }
            Err(e) => {
                warn!("offline gain computation failed: {}", e);
                None
            }
        };
        Self { gain }
    }

    /// `XI_DU`, or `None` when the Hessian was singular
    pub fn gain(&self) -> Option<&DMatrix<f64>> {
        self.gain.as_ref()
    }
}

impl IncrementSolver for OfflineGainSolver {
    fn solve(
        &mut self,
        _model: &PredictionModel,
        _weights: &Weights,
        err: &DVector<f64>,
        du: &mut DVector<f64>,
    ) -> MpcResult<()> {
        match &self.gain {
            Some(gain) => {
                du.gemv(1.0, gain, err, 0.0);
                Ok(())
            }
            None => {
                du.fill(0.0);
                Err(MpcError::SingularMatrix("Hessian"))
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.gain.is_some()
    }

    fn kind(&self) -> SolverKind {
        SolverKind::OfflineGain
    }
}
