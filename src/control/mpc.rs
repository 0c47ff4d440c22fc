//! Unconstrained linear MPC control loop
//!
//! Each tick computes the predicted tracking error, asks the configured
//! solver for the first control increment and integrates it:
//!
//! ```text
//! Err(k) = SP(k) - CPSI*x(k) - COMEGA*u(k-1)
//! u(k)   = u(k-1) + du(k)
//! ```
//!
//! When a factorization is singular the increment is forced to zero, so the
//! input holds its previous value.

use std::fmt;

use log::{debug, trace, warn};
use nalgebra::{DVector, SVector};

use crate::common::{Horizon, IncrementSolver, MpcError, MpcResult, PlantModel};
use crate::control::solver::Solver;
use crate::control::{MpcConfig, PredictionModel, SolverKind, Weights};

/// Health of the controller's precomputed artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Offline artifacts valid, ticks are solved
    Ready,
    /// A factorization failed; every tick holds the input until reinit
    Degraded,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerState::Ready => write!(f, "READY"),
            ControllerState::Degraded => write!(f, "DEGRADED"),
        }
    }
}

/// MPC for a plant with `N` states, `M` inputs and `Z` outputs
#[derive(Debug, Clone)]
pub struct ModelPredictiveController<const N: usize, const M: usize, const Z: usize> {
    config: MpcConfig,
    plant: PlantModel<N, M, Z>,
    model: PredictionModel,
    weights: Weights,
    solver: Solver,
    state: ControllerState,
    err: DVector<f64>,
    du: DVector<f64>,
}

impl<const N: usize, const M: usize, const Z: usize> ModelPredictiveController<N, M, Z> {
    /// Create a controller with the scalar weights of `config`
    pub fn new(plant: PlantModel<N, M, Z>, config: MpcConfig) -> MpcResult<Self> {
        let horizon = config.validate(N, M, Z)?;
        let weights = Weights::uniform(config.weight_q, config.weight_r, horizon, Z, M)?;
        Ok(Self::assemble(plant, config, horizon, weights))
    }

    /// Create a controller with per-output / per-input weights
    ///
    /// `config.weight_q` and `config.weight_r` are ignored.
    pub fn with_channel_weights(
        plant: PlantModel<N, M, Z>,
        config: MpcConfig,
        q_per_output: &[f64; Z],
        r_per_input: &[f64; M],
    ) -> MpcResult<Self> {
        let horizon = config.validate(N, M, Z)?;
        let weights = Weights::from_diagonals(q_per_output, r_per_input, horizon)?;
        Ok(Self::assemble(plant, config, horizon, weights))
    }

    fn assemble(plant: PlantModel<N, M, Z>, config: MpcConfig, horizon: Horizon, weights: Weights) -> Self {
        let model = PredictionModel::build(&plant, horizon);
        let solver = Solver::prepare(config.solver, &model, &weights, config.zero_threshold);

        let state = if solver.is_ready() {
            ControllerState::Ready
        } else {
            warn!("{} solver could not be prepared, controller is {}", config.solver, ControllerState::Degraded);
            ControllerState::Degraded
        };
        debug!(
            "mpc initialized: solver={} Hp={} Hu={} weight_q={} weight_r={} state={}",
            config.solver, horizon.prediction(), horizon.control(), config.weight_q, config.weight_r, state
        );

        Self {
            err: DVector::zeros(model.output_rows()),
            du: DVector::zeros(M),
            config,
            plant,
            model,
            weights,
            solver,
            state,
        }
    }

    /// Rebuild every derived matrix for a new plant and scalar weights
    ///
    /// On error the previous controller is left untouched.
    pub fn reinit(&mut self, plant: PlantModel<N, M, Z>, weight_q: f64, weight_r: f64) -> MpcResult<()> {
        let config = self.config.clone().with_weights(weight_q, weight_r);
        *self = Self::new(plant, config)?;
        Ok(())
    }

    /// Rebuild with a different configuration (horizon, solver, thresholds)
    pub fn reconfigure(&mut self, config: MpcConfig) -> MpcResult<()> {
        *self = Self::new(self.plant, config)?;
        Ok(())
    }

    /// Run one control tick, updating `u` in place
    ///
    /// Returns `false` (with `u` unchanged) when no valid increment could be
    /// computed.
    pub fn update(&mut self, setpoint: &DVector<f64>, x: &SVector<f64, N>, u: &mut SVector<f64, M>) -> bool {
        match self.try_update(setpoint, x, u) {
            Ok(_) => true,
            Err(MpcError::Degraded) => {
                trace!("mpc is {}, holding input", ControllerState::Degraded);
                false
            }
            Err(e) if e.is_numerical() => {
                debug!("mpc update failed, holding input: {}", e);
                false
            }
            Err(e) => {
                warn!("mpc update failed, holding input: {}", e);
                false
            }
        }
    }

    /// Run one control tick and return the applied increment
    pub fn try_update(
        &mut self,
        setpoint: &DVector<f64>,
        x: &SVector<f64, N>,
        u: &mut SVector<f64, M>,
    ) -> MpcResult<SVector<f64, M>> {
        if self.state == ControllerState::Degraded {
            return Err(MpcError::Degraded);
        }
        if setpoint.len() != self.model.output_rows() {
            return Err(MpcError::DimensionMismatch {
                name: "setpoint",
                expected: self.model.output_rows(),
                found: setpoint.len(),
            });
        }

        self.model.tracking_error_into(setpoint, x, u, &mut self.err);
        if let Err(e) = self.solver.solve(&self.model, &self.weights, &self.err, &mut self.du) {
            if e.is_numerical() {
                warn!("{} solve failed, controller is {}: {}", self.solver.kind(), ControllerState::Degraded, e);
                self.state = ControllerState::Degraded;
            }
            return Err(e);
        }

        let du = SVector::<f64, M>::from_column_slice(self.du.as_slice());
        *u += du;
        trace!("mpc tick: |err|={:.6} |du|={:.6}", self.err.norm(), du.norm());
        Ok(du)
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ControllerState::Ready
    }

    pub fn config(&self) -> &MpcConfig {
        &self.config
    }

    pub fn plant(&self) -> &PlantModel<N, M, Z> {
        &self.plant
    }

    pub fn horizon(&self) -> Horizon {
        self.model.horizon()
    }

    pub fn solver_kind(&self) -> SolverKind {
        self.solver.kind()
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    pub fn prediction_model(&self) -> &PredictionModel {
        &self.model
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// Tracking error of the last tick
    pub fn last_error(&self) -> &DVector<f64> {
        &self.err
    }
}
