//! Hessian factorization every tick
//!
//! ```text
//! G  = 2 * CTHETA' * Q * Err
//! H  = CTHETA' * Q * CTHETA + R
//! dU = 0.5 * H^-1 * G
//! ```
//!
//! `H^-1 * G` is applied through an in-place Cholesky solve whose storage is
//! reused from tick to tick, so a successful tick does not allocate.

use nalgebra::{DMatrix, DVector};

use crate::common::{IncrementSolver, MpcResult};
use crate::control::linalg::checked_cholesky;
use crate::control::{PredictionModel, SolverKind, Weights};

/// Solver with no offline work beyond the prediction model
#[derive(Debug, Clone, PartialEq)]
pub struct DirectInverseSolver {
    zero_threshold: f64,
    q_err: DVector<f64>,
    gradient: DVector<f64>,
    q_ctheta: DMatrix<f64>,
    hessian: DMatrix<f64>,
    factor: DMatrix<f64>,
    du_full: DVector<f64>,
}

impl DirectInverseSolver {
    pub fn new(model: &PredictionModel, zero_threshold: f64) -> Self {
        let rows = model.output_rows();
        let cols = model.increment_rows();
        Self {
            zero_threshold,
            q_err: DVector::zeros(rows),
            gradient: DVector::zeros(cols),
            q_ctheta: DMatrix::zeros(rows, cols),
            hessian: DMatrix::zeros(cols, cols),
            factor: DMatrix::zeros(cols, cols),
            du_full: DVector::zeros(cols),
        }
    }

    /// Hessian `H` of the last solve
    pub fn hessian(&self) -> &DMatrix<f64> {
        &self.hessian
    }

    /// Gradient term `G` of the last solve
    pub fn gradient(&self) -> &DVector<f64> {
        &self.gradient
    }

    /// Full `Hu*M` optimum of the last successful solve
    pub fn full_increment(&self) -> &DVector<f64> {
        &self.du_full
    }
}

impl IncrementSolver for DirectInverseSolver {
    fn solve(
        &mut self,
        model: &PredictionModel,
        weights: &Weights,
        err: &DVector<f64>,
        du: &mut DVector<f64>,
    ) -> MpcResult<()> {
        let ctheta = model.ctheta();

        self.q_err.gemv(1.0, weights.q(), err, 0.0);
        self.gradient.gemv_tr(2.0, ctheta, &self.q_err, 0.0);

        self.q_ctheta.gemm(1.0, weights.q(), ctheta, 0.0);
        self.hessian.copy_from(weights.r());
        self.hessian.gemm_tr(1.0, ctheta, &self.q_ctheta, 1.0);

        self.factor.copy_from(&self.hessian);
        let factor = std::mem::replace(&mut self.factor, DMatrix::zeros(0, 0));
        let chol = match checked_cholesky(factor, self.zero_threshold, "Hessian") {
            Ok(chol) => chol,
            Err(e) => {
                self.factor = DMatrix::zeros(self.hessian.nrows(), self.hessian.ncols());
                self.du_full.fill(0.0);
                du.fill(0.0);
                return Err(e);
            }
        };

        self.du_full.copy_from(&self.gradient);
        chol.solve_mut(&mut self.du_full);
        self.du_full *= 0.5;
        self.factor = chol.unpack_dirty();

        du.copy_from(&self.du_full.rows(0, du.len()));
        Ok(())
    }

    fn kind(&self) -> SolverKind {
        SolverKind::DirectInverse
    }
}
