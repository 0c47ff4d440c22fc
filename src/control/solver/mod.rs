//! Increment solvers
//!
//! Three derivations of one optimum with different offline/online splits.

pub mod direct_inverse;
pub mod least_squares;
pub mod offline_gain;

pub use direct_inverse::DirectInverseSolver;
pub use least_squares::{Factorization, LeastSquaresSolver};
pub use offline_gain::OfflineGainSolver;

use nalgebra::DVector;

use crate::common::{IncrementSolver, MpcResult};
use crate::control::{PredictionModel, SolverKind, Weights};

/// Solver selected at configuration time
#[derive(Debug, Clone, PartialEq)]
pub enum Solver {
    DirectInverse(DirectInverseSolver),
    LeastSquares(LeastSquaresSolver),
    OfflineGain(OfflineGainSolver),
}

impl Solver {
    /// Build the solver and run its offline precomputation
    pub fn prepare(kind: SolverKind, model: &PredictionModel, weights: &Weights, zero_threshold: f64) -> Self {
        match kind {
            SolverKind::DirectInverse => {
                Solver::DirectInverse(DirectInverseSolver::new(model, zero_threshold))
            }
            SolverKind::LeastSquaresOnline => Solver::LeastSquares(LeastSquaresSolver::new(
                model,
                weights,
                Factorization::Online,
                zero_threshold,
            )),
            SolverKind::LeastSquaresOffline => Solver::LeastSquares(LeastSquaresSolver::new(
                model,
                weights,
                Factorization::Offline,
                zero_threshold,
            )),
            SolverKind::OfflineGain => {
                Solver::OfflineGain(OfflineGainSolver::new(model, weights, zero_threshold))
            }
        }
    }

    fn inner(&self) -> &dyn IncrementSolver {
        match self {
            Solver::DirectInverse(s) => s,
            Solver::LeastSquares(s) => s,
            Solver::OfflineGain(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn IncrementSolver {
        match self {
            Solver::DirectInverse(s) => s,
            Solver::LeastSquares(s) => s,
            Solver::OfflineGain(s) => s,
        }
    }
}

impl IncrementSolver for Solver {
    fn solve(
        &mut self,
        model: &PredictionModel,
        weights: &Weights,
        err: &DVector<f64>,
        du: &mut DVector<f64>,
    ) -> MpcResult<()> {
        self.inner_mut().solve(model, weights, err, du)
    }

    fn is_ready(&self) -> bool {
        self.inner().is_ready()
    }

    fn kind(&self) -> SolverKind {
        self.inner().kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Horizon, PlantModel};
    use crate::control::constant_setpoint;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix2x4, Matrix4, Matrix4x2, Vector2, Vector4};

    fn reference_plant() -> PlantModel<4, 2, 2> {
        PlantModel::new(
            Matrix4::new(
                0.8, 0.1, 0.0, 0.0,
                0.0, 0.7, 0.0, 0.0,
                0.0, 0.0, 0.9, 0.05,
                0.0, 0.0, 0.0, 0.6,
            ),
            Matrix4x2::new(
                0.0, 0.0,
                1.0, 0.2,
                0.0, 0.0,
                0.3, 1.0,
            ),
            Matrix2x4::new(
                1.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 1.0, 0.0,
            ),
        )
    }

    fn setup() -> (PredictionModel, Weights, DVector<f64>) {
        let plant = reference_plant();
        let horizon = Horizon::new(7, 4).unwrap();
        let model = PredictionModel::build(&plant, horizon);
        let weights = Weights::from_diagonals(&[1.0, 2.0], &[0.5, 1.0], horizon).unwrap();
        let sp = constant_setpoint(&Vector2::new(1.0, -0.5), 7);
        let err = model.tracking_error(&sp, &Vector4::new(0.2, -0.1, 0.4, 0.0), &Vector2::new(0.1, 0.3));
        (model, weights, err)
    }

    fn applied_increment(kind: SolverKind, model: &PredictionModel, weights: &Weights, err: &DVector<f64>) -> DVector<f64> {
        let mut solver = Solver::prepare(kind, model, weights, 1e-12);
        assert!(solver.is_ready());
        assert_eq!(solver.kind(), kind);
        let mut du = DVector::zeros(2);
        solver.solve(model, weights, err, &mut du).unwrap();
        du
    }

    #[test]
    fn test_all_solvers_agree() {
        let (model, weights, err) = setup();
        let reference = applied_increment(SolverKind::DirectInverse, &model, &weights, &err);
        assert!(reference.norm() > 1e-3);
        for &kind in SolverKind::ALL.iter() {
            let du = applied_increment(kind, &model, &weights, &err);
            assert_relative_eq!(du, reference, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_gain_matches_first_rows_of_direct_solution() {
        let (model, weights, err) = setup();

        let mut direct = DirectInverseSolver::new(&model, 1e-12);
        let mut du = DVector::zeros(2);
        direct.solve(&model, &weights, &err, &mut du).unwrap();

        // 0.5 * H^-1 * G from the direct solver's own terms
        let hessian_inv = direct.hessian().clone().try_inverse().unwrap();
        let full = hessian_inv * direct.gradient() * 0.5;
        assert_relative_eq!(full.clone(), direct.full_increment().clone(), epsilon = 1e-10);

        let gain = OfflineGainSolver::new(&model, &weights, 1e-12);
        let xi_err = gain.gain().unwrap() * &err;
        assert_relative_eq!(xi_err, full.rows(0, 2).into_owned(), epsilon = 1e-9);
    }

    #[test]
    fn test_least_squares_full_optimum_matches_direct() {
        let (model, weights, err) = setup();
        let mut direct = DirectInverseSolver::new(&model, 1e-12);
        let mut ls = LeastSquaresSolver::new(&model, &weights, Factorization::Offline, 1e-12);
        let mut du = DVector::zeros(2);
        direct.solve(&model, &weights, &err, &mut du).unwrap();
        ls.solve(&model, &weights, &err, &mut du).unwrap();
        assert_eq!(ls.full_increment().len(), 8);
        assert_relative_eq!(ls.full_increment().clone(), direct.full_increment().clone(), epsilon = 1e-9);
    }

    #[test]
    fn test_zero_error_gives_zero_increment() {
        let (model, weights, _) = setup();
        let err = DVector::zeros(model.output_rows());
        for &kind in SolverKind::ALL.iter() {
            let du = applied_increment(kind, &model, &weights, &err);
            assert_relative_eq!(du.norm(), 0.0, epsilon = 1e-14);
        }
    }
}
