//! Weighted least-squares formulation of the MPC problem
//!
//! ```text
//! min || [sqrt(Q)*CTHETA] dU - [sqrt(Q)*Err] ||^2
//!     || [   sqrt(R)    ]      [     0     ] ||
//! ```
//!
//! With `[sqrt(Q)*CTHETA; sqrt(R)] = Q_L * R_L` the minimizer solves
//! `R_L * dU = (Q_L' * rhs)(0..Hu*M)`. Only the leading `Hp*Z` columns of
//! `Q_L'` meet a non-zero right-hand side.

use log::warn;
use nalgebra::{DMatrix, DVector};

use crate::common::{IncrementSolver, MpcError, MpcResult};
use crate::control::linalg::{back_substitute, checked_qr};
use crate::control::{PredictionModel, SolverKind, Weights};

/// When the QR factorization of the stacked matrix is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Factorization {
    /// Every tick. The QR factors are allocated anew on each solve, so this
    /// variant is not allocation-free after initialization.
    Online,
    /// Once, when the solver is built
    Offline,
}

#[derive(Debug, Clone, PartialEq)]
struct LeastSquaresFactors {
    /// First `Hu*M` rows and `Hp*Z` columns of `Q_L'`
    projection: DMatrix<f64>,
    /// `Hu*M x Hu*M` upper triangle
    r: DMatrix<f64>,
}

impl LeastSquaresFactors {
    fn factorize(stacked: DMatrix<f64>, output_rows: usize, zero_threshold: f64) -> MpcResult<Self> {
        let factors = checked_qr(stacked, zero_threshold, "least-squares stack")?;
        Ok(Self {
            projection: factors.q_t.columns(0, output_rows).into_owned(),
            r: factors.r,
        })
    }
}

/// QR-based solver, online or offline factorized
#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquaresSolver {
    factorization: Factorization,
    zero_threshold: f64,
    factors: Option<LeastSquaresFactors>,
    stacked: DMatrix<f64>,
    weighted_err: DVector<f64>,
    du_full: DVector<f64>,
}

impl LeastSquaresSolver {
    pub fn new(
        model: &PredictionModel,
        weights: &Weights,
        factorization: Factorization,
        zero_threshold: f64,
    ) -> Self {
        let rows = model.output_rows();
        let cols = model.increment_rows();
        let mut solver = Self {
            factorization,
            zero_threshold,
            factors: None,
            stacked: DMatrix::zeros(rows + cols, cols),
            weighted_err: DVector::zeros(rows),
            du_full: DVector::zeros(cols),
        };

        if factorization == Factorization::Offline {
            fill_stacked(&mut solver.stacked, model, weights);
            match LeastSquaresFactors::factorize(solver.stacked.clone(), rows, zero_threshold) {
                Ok(factors) => solver.factors = Some(factors),
                Err(e) => warn!("offline least-squares factorization failed: {}", e),
            }
        }
        solver
    }

    pub fn factorization(&self) -> Factorization {
        self.factorization
    }

    /// Full `Hu*M` optimum of the last successful solve
    pub fn full_increment(&self) -> &DVector<f64> {
        &self.du_full
    }

    fn solve_full(&mut self, model: &PredictionModel, weights: &Weights, err: &DVector<f64>) -> MpcResult<()> {
        if self.factorization == Factorization::Online {
            fill_stacked(&mut self.stacked, model, weights);
            self.factors = Some(LeastSquaresFactors::factorize(
                self.stacked.clone(),
                model.output_rows(),
                self.zero_threshold,
            )?);
        }
        let factors = self
            .factors
            .as_ref()
            .ok_or(MpcError::RankDeficient("least-squares stack"))?;

        self.weighted_err.copy_from(err);
        self.weighted_err.component_mul_assign(weights.sqrt_q_diagonal());
        self.du_full.gemv(1.0, &factors.projection, &self.weighted_err, 0.0);
        back_substitute(&factors.r, &mut self.du_full, self.zero_threshold)
    }
}

impl IncrementSolver for LeastSquaresSolver {
    fn solve(
        &mut self,
        model: &PredictionModel,
        weights: &Weights,
        err: &DVector<f64>,
        du: &mut DVector<f64>,
    ) -> MpcResult<()> {
        if let Err(e) = self.solve_full(model, weights, err) {
            if self.factorization == Factorization::Online {
                self.factors = None;
            }
            self.du_full.fill(0.0);
            du.fill(0.0);
            return Err(e);
        }
        du.copy_from(&self.du_full.rows(0, du.len()));
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.factorization == Factorization::Online || self.factors.is_some()
    }

    fn kind(&self) -> SolverKind {
        match self.factorization {
            Factorization::Online => SolverKind::LeastSquaresOnline,
            Factorization::Offline => SolverKind::LeastSquaresOffline,
        }
    }
}

/// `[sqrt(Q)*CTHETA; sqrt(R)]`
fn fill_stacked(stacked: &mut DMatrix<f64>, model: &PredictionModel, weights: &Weights) {
    let ctheta = model.ctheta();
    let (rows, cols) = ctheta.shape();
    let sqrt_q = weights.sqrt_q_diagonal();
    let sqrt_r = weights.sqrt_r_diagonal();

    stacked.fill(0.0);
    for i in 0..rows {
        for j in 0..cols {
            stacked[(i, j)] = sqrt_q[i] * ctheta[(i, j)];
        }
    }
    for j in 0..cols {
        stacked[(rows + j, j)] = sqrt_r[j];
    }
}
