// Closed-loop setpoint tracking with unconstrained linear MPC
//
// Two lightly coupled second-order channels sampled at 20 ms, two inputs,
// two measured outputs. The setpoint steps halfway through the run.
//
// usage: mpc_tracking [config.toml]

use log::{info, warn};
use nalgebra::{Matrix2x4, Matrix4, Matrix4x2, Vector2, Vector4};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use lti_mpc::control::constant_setpoint;
use lti_mpc::utils::{colors, SeriesStyle, Visualizer};
use lti_mpc::{ModelPredictiveController, MpcConfig, MpcError, MpcResult, PlantModel, SolverKind};

const DT: f64 = 0.02; // sampling time [s]
const SIM_TICKS: usize = 400;
const MEASUREMENT_NOISE: f64 = 0.002; // std of the state estimate noise
const SEED: u64 = 42;

fn plant() -> PlantModel<4, 2, 2> {
    PlantModel::new(
        Matrix4::new(
            0.8, 0.1, 0.0, 0.0,
            0.0, 0.7, 0.0, 0.0,
            0.0, 0.0, 0.9, 0.05,
            0.0, 0.0, 0.0, 0.6,
        ),
        Matrix4x2::new(
            0.0, 0.0,
            1.0, 0.1,
            0.0, 0.0,
            0.1, 1.0,
        ),
        Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
        ),
    )
}

fn target_at(tick: usize) -> Vector2<f64> {
    if tick < SIM_TICKS / 2 {
        Vector2::new(1.0, -0.5)
    } else {
        Vector2::new(-0.5, 0.8)
    }
}

struct Trace {
    time: Vec<f64>,
    outputs: [Vec<f64>; 2],
    inputs: [Vec<f64>; 2],
    failed_ticks: usize,
}

fn simulate(config: MpcConfig, noise_std: f64) -> MpcResult<Trace> {
    let plant = plant();
    let mut mpc = ModelPredictiveController::new(plant, config)?;
    let hp = mpc.horizon().prediction();

    let noise = Normal::new(0.0, noise_std).map_err(|e| MpcError::Config(e.to_string()))?;
    let mut rng = StdRng::seed_from_u64(SEED);

    let mut x = Vector4::zeros();
    let mut u = Vector2::zeros();
    let mut trace = Trace {
        time: Vec::with_capacity(SIM_TICKS),
        outputs: [Vec::with_capacity(SIM_TICKS), Vec::with_capacity(SIM_TICKS)],
        inputs: [Vec::with_capacity(SIM_TICKS), Vec::with_capacity(SIM_TICKS)],
        failed_ticks: 0,
    };

    for tick in 0..SIM_TICKS {
        let sp = constant_setpoint(&target_at(tick), hp);
        let x_est = x.map(|v| v + noise.sample(&mut rng));
        if !mpc.update(&sp, &x_est, &mut u) {
            trace.failed_ticks += 1;
        }
        x = plant.step(&x, &u);

        let z = plant.output(&x);
        trace.time.push((tick + 1) as f64 * DT);
        for i in 0..2 {
            trace.outputs[i].push(z[i]);
            trace.inputs[i].push(u[i]);
        }
    }
    Ok(trace)
}

fn plot(trace: &Trace, solver: SolverKind) -> MpcResult<()> {
    std::fs::create_dir_all("img/mpc")?;

    let mut vis = Visualizer::new();
    vis.set_title(&format!("MPC setpoint tracking ({})", solver))
        .set_y_label("Output / Input");
    let half = trace.time.len() / 2;
    for i in 0..2 {
        vis.plot_setpoint(&trace.time[..half], target_at(0)[i], &format!("SP z{}", i + 1));
        vis.plot_setpoint(&trace.time[half..], target_at(SIM_TICKS)[i], "");
        vis.plot_series(
            &trace.time,
            &trace.outputs[i],
            &SeriesStyle::new(colors::OUTPUT[i], &format!("z{}", i + 1)),
        );
        vis.plot_series(
            &trace.time,
            &trace.inputs[i],
            &SeriesStyle::new(colors::INPUT, &format!("u{}", i + 1)).with_line_width(1.0),
        );
    }

    let output_path = "img/mpc/mpc_tracking.png";
    vis.save_png(output_path, 800, 600)?;
    info!("Response plot saved to: {}", output_path);
    Ok(())
}

fn main() -> MpcResult<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => MpcConfig::from_file(&path)?,
        None => MpcConfig::default(),
    };
    info!(
        "Hp={} Hu={} weight_q={} weight_r={} solver={}",
        config.prediction_horizon, config.control_horizon, config.weight_q, config.weight_r, config.solver
    );

    // Noise-free comparison of every solver
    for &kind in SolverKind::ALL.iter() {
        let trace = simulate(config.clone().with_solver(kind), 0.0)?;
        let final_target = target_at(SIM_TICKS);
        let e1 = trace.outputs[0].last().copied().unwrap_or_default() - final_target[0];
        let e2 = trace.outputs[1].last().copied().unwrap_or_default() - final_target[1];
        info!(
            "{:>22}: final tracking error = {:.3e}, failed ticks = {}",
            kind.to_string(),
            (e1 * e1 + e2 * e2).sqrt(),
            trace.failed_ticks
        );
    }

    let trace = simulate(config.clone(), MEASUREMENT_NOISE)?;
    if trace.failed_ticks > 0 {
        warn!("{} ticks held the input", trace.failed_ticks);
    }
    if let Err(e) = plot(&trace, config.solver) {
        warn!("could not plot response: {}", e);
    }

    info!("MPC tracking simulation complete!");
    Ok(())
}
