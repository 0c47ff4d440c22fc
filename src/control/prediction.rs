//! Lifted prediction model
//!
//! Over a prediction horizon Hp and control horizon Hu the plant satisfies
//!
//! ```text
//! X(k+1..k+Hp) = PSI*x(k) + OMEGA*u(k-1) + THETA*dU(k..k+Hu-1)
//! Z(k+1..k+Hp) = CPSI*x(k) + COMEGA*u(k-1) + CTHETA*dU(k..k+Hu-1)
//! ```
//!
//! with `PSI = [A; A^2; ..; A^Hp]`, `OMEGA = [B; B+AB; ..; sum(i<Hp) A^i B]`
//! and `THETA` the lower block-triangular Toeplitz matrix whose k-th block
//! column is `OMEGA` shifted down by k blocks. The output forms are the state
//! forms premultiplied by `blockdiag(C, .., C)`.

use log::debug;
use nalgebra::{DMatrix, DVector, SMatrix, SVector};

use crate::common::{Horizon, PlantModel};
use crate::control::linalg::{block_diagonal, shifted_block_columns};

/// State-level lifting `PSI`, `OMEGA`, `THETA`
#[derive(Debug, Clone, PartialEq)]
pub struct StateLifting {
    /// `(Hp*N) x N`
    pub psi: DMatrix<f64>,
    /// `(Hp*N) x M`
    pub omega: DMatrix<f64>,
    /// `(Hp*N) x (Hu*M)`
    pub theta: DMatrix<f64>,
}

impl StateLifting {
    pub fn build<const N: usize, const M: usize, const Z: usize>(
        plant: &PlantModel<N, M, Z>,
        horizon: Horizon,
    ) -> Self {
        let rows = horizon.state_rows(N);
        let mut psi = DMatrix::zeros(rows, N);
        let mut omega = DMatrix::zeros(rows, M);

        let mut a_pow = SMatrix::<f64, N, N>::identity();
        let mut sigma = SMatrix::<f64, N, M>::zeros();
        for i in 0..horizon.prediction() {
            sigma += a_pow * plant.b;
            a_pow *= plant.a;
            psi.fixed_view_mut::<N, N>(i * N, 0).copy_from(&a_pow);
            omega.fixed_view_mut::<N, M>(i * N, 0).copy_from(&sigma);
        }
        let theta = shifted_block_columns(&omega, N, horizon.control());

        Self { psi, omega, theta }
    }
}

/// Output-level prediction matrices `CPSI`, `COMEGA`, `CTHETA`
///
/// Rebuilt as a whole whenever the plant or horizon changes.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionModel {
    horizon: Horizon,
    state_dim: usize,
    input_dim: usize,
    output_dim: usize,
    cpsi: DMatrix<f64>,
    comega: DMatrix<f64>,
    ctheta: DMatrix<f64>,
}

impl PredictionModel {
    /// Build the output matrices directly, premultiplying every block by C
    pub fn build<const N: usize, const M: usize, const Z: usize>(
        plant: &PlantModel<N, M, Z>,
        horizon: Horizon,
    ) -> Self {
        let rows = horizon.output_rows(Z);
        let mut cpsi = DMatrix::zeros(rows, N);
        let mut comega = DMatrix::zeros(rows, M);

        let mut a_pow = SMatrix::<f64, N, N>::identity();
        let mut sigma = SMatrix::<f64, N, M>::zeros();
        for i in 0..horizon.prediction() {
            sigma += a_pow * plant.b;
            a_pow *= plant.a;
            cpsi.fixed_view_mut::<Z, N>(i * Z, 0).copy_from(&(plant.c * a_pow));
            comega.fixed_view_mut::<Z, M>(i * Z, 0).copy_from(&(plant.c * sigma));
        }
        let ctheta = shifted_block_columns(&comega, Z, horizon.control());

        debug!(
            "prediction model built: N={} M={} Z={} Hp={} Hu={}",
            N, M, Z, horizon.prediction(), horizon.control()
        );

        Self {
            horizon,
            state_dim: N,
            input_dim: M,
            output_dim: Z,
            cpsi,
            comega,
            ctheta,
        }
    }

    /// Build `PSI`/`OMEGA`/`THETA` first, then apply `blockdiag(C)`
    pub fn build_lifted<const N: usize, const M: usize, const Z: usize>(
        plant: &PlantModel<N, M, Z>,
        horizon: Horizon,
    ) -> Self {
        let lifting = StateLifting::build(plant, horizon);
        let cz = block_diagonal(&plant.c, horizon.prediction());

        Self {
            horizon,
            state_dim: N,
            input_dim: M,
            output_dim: Z,
            cpsi: &cz * &lifting.psi,
            comega: &cz * &lifting.omega,
            ctheta: &cz * &lifting.theta,
        }
    }

    /// `Err = SP - CPSI*x - COMEGA*u_prev`, written into `err`
    pub fn tracking_error_into<const N: usize, const M: usize>(
        &self,
        setpoint: &DVector<f64>,
        x: &SVector<f64, N>,
        u_prev: &SVector<f64, M>,
        err: &mut DVector<f64>,
    ) {
        err.copy_from(setpoint);
        err.gemv(-1.0, &self.cpsi, x, 1.0);
        err.gemv(-1.0, &self.comega, u_prev, 1.0);
    }

    /// Allocating form of [`tracking_error_into`](Self::tracking_error_into)
    pub fn tracking_error<const N: usize, const M: usize>(
        &self,
        setpoint: &DVector<f64>,
        x: &SVector<f64, N>,
        u_prev: &SVector<f64, M>,
    ) -> DVector<f64> {
        let mut err = DVector::zeros(self.output_rows());
        self.tracking_error_into(setpoint, x, u_prev, &mut err);
        err
    }

    /// Predicted output trajectory for a planned increment sequence
    pub fn predict<const N: usize, const M: usize>(
        &self,
        x: &SVector<f64, N>,
        u_prev: &SVector<f64, M>,
        du: &DVector<f64>,
    ) -> DVector<f64> {
        &self.cpsi * x + &self.comega * u_prev + &self.ctheta * du
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    /// Hp * Z
    pub fn output_rows(&self) -> usize {
        self.horizon.output_rows(self.output_dim)
    }

    /// Hu * M
    pub fn increment_rows(&self) -> usize {
        self.horizon.increment_rows(self.input_dim)
    }

    pub fn cpsi(&self) -> &DMatrix<f64> {
        &self.cpsi
    }

    pub fn comega(&self) -> &DMatrix<f64> {
        &self.comega
    }

    pub fn ctheta(&self) -> &DMatrix<f64> {
        &self.ctheta
    }
}

/// Setpoint trajectory holding `target` over the whole prediction horizon
pub fn constant_setpoint<const Z: usize>(target: &SVector<f64, Z>, prediction: usize) -> DVector<f64> {
    DVector::from_iterator(
        prediction * Z,
        (0..prediction).flat_map(|_| target.iter().copied()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix1, Matrix2x4, Matrix4, Matrix4x2, Vector1, Vector2, Vector4};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_plant(seed: u64) -> PlantModel<4, 2, 2> {
        let mut rng = StdRng::seed_from_u64(seed);
        let a = Matrix4::from_fn(|_, _| rng.gen_range(-0.4..0.4));
        let b = Matrix4x2::from_fn(|_, _| rng.gen_range(-1.0..1.0));
        let c = Matrix2x4::from_fn(|_, _| rng.gen_range(-1.0..1.0));
        PlantModel::new(a, b, c)
    }

    #[test]
    fn test_scalar_theta() {
        let (a, b) = (0.5, 2.0);
        let plant = PlantModel::new(Matrix1::new(a), Matrix1::new(b), Matrix1::new(1.0));
        let horizon = Horizon::new(3, 2).unwrap();

        let expected = DMatrix::from_row_slice(
            3,
            2,
            &[
                b, 0.0,
                b + a * b, b,
                b + a * b + a * a * b, b + a * b,
            ],
        );
        let lifting = StateLifting::build(&plant, horizon);
        assert_relative_eq!(lifting.theta, expected, epsilon = 1e-12);
        let psi = DMatrix::from_column_slice(3, 1, &[a, a * a, a * a * a]);
        assert_relative_eq!(lifting.psi, psi, epsilon = 1e-12);

        let model = PredictionModel::build(&plant, horizon);
        assert_relative_eq!(model.ctheta().clone(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_builder_paths_agree() {
        let plant = random_plant(7);
        let horizon = Horizon::new(7, 4).unwrap();
        let direct = PredictionModel::build(&plant, horizon);
        let lifted = PredictionModel::build_lifted(&plant, horizon);

        assert_eq!(direct.cpsi().shape(), (14, 4));
        assert_eq!(direct.comega().shape(), (14, 2));
        assert_eq!(direct.ctheta().shape(), (14, 8));
        assert_relative_eq!(direct.cpsi().clone(), lifted.cpsi().clone(), epsilon = 1e-10);
        assert_relative_eq!(direct.comega().clone(), lifted.comega().clone(), epsilon = 1e-10);
        assert_relative_eq!(direct.ctheta().clone(), lifted.ctheta().clone(), epsilon = 1e-10);
    }

    #[test]
    fn test_build_is_deterministic() {
        let plant = random_plant(11);
        let horizon = Horizon::new(5, 3).unwrap();
        assert_eq!(PredictionModel::build(&plant, horizon), PredictionModel::build(&plant, horizon));
    }

    #[test]
    fn test_theta_upper_blocks_are_zero() {
        let plant = random_plant(3);
        let horizon = Horizon::new(6, 3).unwrap();
        let model = PredictionModel::build(&plant, horizon);
        let ctheta = model.ctheta();
        // Block column k starts k output blocks down
        for k in 1..3 {
            for row in 0..k * 2 {
                for col in k * 2..(k + 1) * 2 {
                    assert_eq!(ctheta[(row, col)], 0.0);
                }
            }
        }
    }

    #[test]
    fn test_prediction_matches_simulation() {
        let plant = random_plant(5);
        let horizon = Horizon::new(6, 3).unwrap();
        let model = PredictionModel::build(&plant, horizon);

        let x0 = Vector4::new(0.3, -0.2, 1.0, 0.5);
        let u_prev = Vector2::new(0.1, -0.4);
        let du = DVector::from_vec(vec![0.5, -0.1, 0.2, 0.3, -0.6, 0.05]);

        let predicted = model.predict(&x0, &u_prev, &du);

        let mut x = x0;
        let mut u = u_prev;
        for step in 0..horizon.prediction() {
            if step < horizon.control() {
                u += Vector2::new(du[2 * step], du[2 * step + 1]);
            }
            x = plant.step(&x, &u);
            let z = plant.output(&x);
            assert_relative_eq!(predicted[2 * step], z[0], epsilon = 1e-10);
            assert_relative_eq!(predicted[2 * step + 1], z[1], epsilon = 1e-10);
        }
    }

    #[test]
    fn test_tracking_error() {
        let plant = PlantModel::new(Matrix1::new(0.5), Matrix1::new(1.0), Matrix1::new(1.0));
        let horizon = Horizon::new(2, 1).unwrap();
        let model = PredictionModel::build(&plant, horizon);
        let sp = constant_setpoint(&Vector1::new(1.0), 2);
        let err = model.tracking_error(&sp, &Vector1::new(2.0), &Vector1::new(0.0));
        // z(k+1) = 1.0, z(k+2) = 0.5 with zero input
        assert_relative_eq!(err, DVector::from_vec(vec![0.0, 0.5]), epsilon = 1e-12);

        let err = model.tracking_error(&sp, &Vector1::new(0.0), &Vector1::new(1.0));
        // z(k+1) = 1.0, z(k+2) = 1.5 when u is held at 1
        assert_relative_eq!(err, DVector::from_vec(vec![0.0, -0.5]), epsilon = 1e-12);
    }

    #[test]
    fn test_constant_setpoint() {
        let sp = constant_setpoint(&Vector2::new(1.0, -2.0), 3);
        assert_eq!(sp.as_slice(), &[1.0, -2.0, 1.0, -2.0, 1.0, -2.0]);
    }
}
