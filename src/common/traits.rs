//! Common traits defining interfaces for the MPC engine

use nalgebra::DVector;

use crate::common::error::MpcResult;
use crate::control::{PredictionModel, SolverKind, Weights};

/// Strategy deriving the control increment from the predicted tracking error
///
/// Every implementation solves the same unconstrained problem
///
/// ```text
/// min  dU' H dU - G' dU,   H = CTHETA' Q CTHETA + R,   G = 2 CTHETA' Q Err
/// ```
///
/// and differs only in what is precomputed when it is constructed.
pub trait IncrementSolver {
    /// Write the increment applied this tick (first M rows of the optimum)
    /// into `du`. On failure `du` is zeroed.
    fn solve(
        &mut self,
        model: &PredictionModel,
        weights: &Weights,
        err: &DVector<f64>,
        du: &mut DVector<f64>,
    ) -> MpcResult<()>;

    /// False when an offline factorization failed
    fn is_ready(&self) -> bool {
        true
    }

    fn kind(&self) -> SolverKind;
}
