use crate::{
    config::JumpConfig,
    physics::{CordParameters, JumpSystem},
    solvers::Integrator,
    traits::{DynamicalSystem, Steppable},
};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Step size used for reference trajectories that coarse runs are compared to.
pub const REFERENCE_STEP: f64 = 0.001;

/// Largest trajectory a single history run may record.
const MAX_HISTORY_SAMPLES: f64 = 1.0e8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DropSettings {
    pub step_size: f64,
    pub integrator: Integrator,
    /// How far below the platform height the jumper may go before the run is
    /// abandoned as divergent.
    pub depth_margin: f64,
    pub max_steps: usize,
}

impl Default for DropSettings {
    fn default() -> Self {
        Self {
            step_size: 0.01,
            integrator: Integrator::Rk4,
            depth_margin: 10.0,
            max_steps: 1_000_000,
        }
    }
}

impl DropSettings {
    pub fn with_step(integrator: Integrator, step_size: f64) -> Self {
        Self {
            step_size,
            integrator,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropTermination {
    /// Velocity turned upward: the first fall is over.
    Rebounded,
    /// Depth bound, step cap or a non-finite state stopped the run.
    Diverged,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DropResult {
    pub max_depth: f64,
    /// Acceleration evaluated at the state where `max_depth` was recorded.
    pub acceleration_at_max: f64,
    pub steps: usize,
    pub elapsed: f64,
    pub termination: DropTermination,
}

impl DropResult {
    pub fn is_diverged(&self) -> bool {
        self.termination == DropTermination::Diverged
    }
}

/// Integrates the first fall from rest at the platform until the jumper
/// starts moving back up.
pub fn simulate_drop(
    config: &JumpConfig,
    cord: CordParameters,
    drag: bool,
    settings: &DropSettings,
) -> Result<DropResult> {
    cord.validate()?;
    if !(settings.step_size.is_finite() && settings.step_size > 0.0) {
        bail!("Step size must be positive.");
    }
    if settings.max_steps == 0 {
        bail!("max_steps must be greater than zero.");
    }
    if !(settings.depth_margin.is_finite() && settings.depth_margin >= 0.0) {
        bail!("Depth margin must be non-negative.");
    }

    let system = JumpSystem::new(config, cord, drag);
    let depth_bound = config.jump_height + settings.depth_margin;
    let mut stepper = settings.integrator.build::<f64>(DynamicalSystem::<f64>::dimension(&system));
    let mut state = [0.0_f64; 2];
    let mut t = 0.0;
    let mut max_depth = 0.0;
    let mut acceleration_at_max = 0.0;
    let mut steps = 0usize;

    let termination = loop {
        if steps >= settings.max_steps {
            break DropTermination::Diverged;
        }
        stepper.step(&system, &mut t, &mut state, settings.step_size);
        steps += 1;

        let (y, v) = (state[0], state[1]);
        if !(y.is_finite() && v.is_finite()) {
            break DropTermination::Diverged;
        }
        if y > max_depth {
            max_depth = y;
            acceleration_at_max = system.acceleration(y, v);
        }
        if max_depth > depth_bound {
            break DropTermination::Diverged;
        }
        if v < 0.0 {
            break DropTermination::Rebounded;
        }
    };

    if termination == DropTermination::Diverged {
        debug!(
            k1 = cord.stiffness,
            k2 = cord.exponent,
            drag,
            steps,
            max_depth,
            "drop run abandoned before the rebound"
        );
    }

    Ok(DropResult {
        max_depth,
        acceleration_at_max,
        steps,
        elapsed: t,
        termination,
    })
}

/// Time series of a jump, one entry per step, starting at the initial state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub positions: Vec<f64>,
    pub velocities: Vec<f64>,
    pub accelerations: Vec<f64>,
}

impl Trajectory {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            times: Vec::with_capacity(capacity),
            positions: Vec::with_capacity(capacity),
            velocities: Vec::with_capacity(capacity),
            accelerations: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, t: f64, y: f64, v: f64, a: f64) {
        self.times.push(t);
        self.positions.push(y);
        self.velocities.push(v);
        self.accelerations.push(a);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Deepest recorded position over the whole run.
    pub fn max_depth(&self) -> Option<f64> {
        self.positions.iter().copied().reduce(f64::max)
    }

    /// Velocities in km/h.
    pub fn velocities_kmh(&self) -> Vec<f64> {
        self.velocities.iter().map(|v| v * 3.6).collect()
    }

    /// Accelerations in multiples of `gravity`.
    pub fn accelerations_in_g(&self, gravity: f64) -> Vec<f64> {
        self.accelerations.iter().map(|a| a / gravity).collect()
    }
}

/// Records the jump over `[0, total_time]` with a fixed step.
///
/// Sample `i` is taken at `t = i * step_size`, before the step that leaves it;
/// the last sample is the largest multiple of the step not past `total_time`.
pub fn simulate_history(
    config: &JumpConfig,
    cord: CordParameters,
    drag: bool,
    total_time: f64,
    step_size: f64,
    integrator: Integrator,
) -> Result<Trajectory> {
    cord.validate()?;
    if !(step_size.is_finite() && step_size > 0.0) {
        bail!("Step size must be positive.");
    }
    if !(total_time.is_finite() && total_time >= 0.0) {
        bail!("Total simulation time must be non-negative.");
    }
    // Tolerate round-off so that e.g. 40 / 0.05 counts 800 whole steps.
    let ratio = (total_time / step_size * (1.0 + 1e-12)).floor();
    if ratio >= MAX_HISTORY_SAMPLES {
        bail!(
            "Requested history needs {} samples; reduce total time or enlarge the step.",
            ratio + 1.0
        );
    }
    let step_count = ratio as usize;

    let system = JumpSystem::new(config, cord, drag);
    let mut stepper = integrator.build::<f64>(DynamicalSystem::<f64>::dimension(&system));
    let mut state = [0.0_f64; 2];
    let mut trajectory = Trajectory::with_capacity(step_count + 1);

    for i in 0..=step_count {
        let mut t = i as f64 * step_size;
        let (y, v) = (state[0], state[1]);
        trajectory.push(t, y, v, system.acceleration(y, v));
        if i < step_count {
            stepper.step(&system, &mut t, &mut state, step_size);
        }
    }

    Ok(trajectory)
}

/// High-resolution RK4 history used as a stand-in for the exact solution.
pub fn reference_history(
    config: &JumpConfig,
    cord: CordParameters,
    drag: bool,
    total_time: f64,
) -> Result<Trajectory> {
    simulate_history(config, cord, drag, total_time, REFERENCE_STEP, Integrator::Rk4)
}
