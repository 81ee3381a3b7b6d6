use crate::{
    config::JumpConfig,
    error::SimulationError,
    simulation::{simulate_drop, DropSettings},
    solvers::Integrator,
};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderReport {
    pub step_sizes: [f64; 2],
    pub results: [f64; 2],
    pub errors: [f64; 2],
    pub order: f64,
}

/// p = ln(e1 / e2) / ln(h1 / h2).
pub fn empirical_order(error1: f64, error2: f64, h1: f64, h2: f64) -> Result<f64> {
    if !(h1 > 0.0 && h2 > 0.0) || h1 == h2 {
        bail!("Step sizes must be positive and distinct.");
    }
    let ratio = error1 / error2;
    if error2 == 0.0 || !ratio.is_finite() || ratio <= 0.0 {
        return Err(SimulationError::OrderUndefined { error1, error2 }.into());
    }
    Ok(ratio.ln() / (h1 / h2).ln())
}

/// Runs `run` at `h1` and `h1 / 2` and measures how fast the error against
/// `reference` shrinks.
pub fn estimate_order<F>(reference: f64, h1: f64, mut run: F) -> Result<OrderReport>
where
    F: FnMut(f64) -> Result<f64>,
{
    if !reference.is_finite() {
        bail!("Reference value must be finite.");
    }
    if !(h1.is_finite() && h1 > 0.0) {
        bail!("Step size must be positive.");
    }
    let h2 = h1 / 2.0;
    let r1 = run(h1)?;
    let r2 = run(h2)?;
    let errors = [(reference - r1).abs(), (reference - r2).abs()];
    let order = empirical_order(errors[0], errors[1], h1, h2)?;
    Ok(OrderReport {
        step_sizes: [h1, h2],
        results: [r1, r2],
        errors,
        order,
    })
}

/// Coarse step used by `verify_drop_order` when none is given.
pub fn default_order_step(integrator: Integrator) -> f64 {
    match integrator {
        Integrator::Euler => 0.005,
        Integrator::Rk4 => 0.25,
    }
}

/// Order of `integrator` on the reference cord, measured on the deepest point
/// of the first fall.
pub fn verify_drop_order(
    config: &JumpConfig,
    integrator: Integrator,
    h1: Option<f64>,
) -> Result<OrderReport> {
    check_reference(config)?;
    let cord = config.reference_cord();
    let h1 = h1.unwrap_or_else(|| default_order_step(integrator));
    let report = estimate_order(config.reference_depth, h1, |h| {
        let settings = DropSettings::with_step(integrator, h);
        let result = simulate_drop(config, cord, false, &settings)?;
        if result.is_diverged() {
            bail!("Reference drop diverged at step size {h}.");
        }
        Ok(result.max_depth)
    })?;
    debug!(
        ?integrator,
        h1,
        error1 = report.errors[0],
        error2 = report.errors[1],
        order = report.order,
        "empirical order"
    );
    Ok(report)
}

/// Simulated time a step-size attempt may use before its drop counts as diverged.
const SEARCH_HORIZON: f64 = 60.0;

/// Drop settings for one step-size attempt, with the step cap raised so that
/// only the step floor, not the cap, ends a search at small steps.
fn search_drop_settings(integrator: Integrator, step: f64) -> DropSettings {
    let mut settings = DropSettings::with_step(integrator, step);
    let horizon_steps = (SEARCH_HORIZON / step).ceil() as usize;
    settings.max_steps = settings.max_steps.max(horizon_steps);
    settings
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepSearchSettings {
    /// Relative error against the reference depth that must be beaten.
    pub tolerance: f64,
    pub initial_step: f64,
    /// No step below this is tried.
    pub step_floor: f64,
    pub max_halvings: usize,
}

impl Default for StepSearchSettings {
    fn default() -> Self {
        Self::for_integrator(Integrator::Euler, 1e-3)
    }
}

impl StepSearchSettings {
    /// RK4 tolerates much coarser steps, so it starts higher.
    pub fn for_integrator(integrator: Integrator, tolerance: f64) -> Self {
        let initial_step = match integrator {
            Integrator::Euler => 0.1,
            Integrator::Rk4 => 1.0,
        };
        Self {
            tolerance,
            initial_step,
            step_floor: 1e-7,
            max_halvings: 40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepAttempt {
    pub step_size: f64,
    pub max_depth: f64,
    pub relative_error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSizeReport {
    pub step_size: f64,
    pub relative_error: f64,
    pub attempts: Vec<StepAttempt>,
}

/// Halves the step until the reference drop lands within `settings.tolerance`
/// (relative) of the reference depth.
pub fn find_step_size(
    config: &JumpConfig,
    integrator: Integrator,
    settings: &StepSearchSettings,
) -> Result<StepSizeReport> {
    check_reference(config)?;
    if !(settings.tolerance.is_finite() && settings.tolerance > 0.0) {
        bail!("Tolerance must be positive.");
    }
    if !(settings.initial_step.is_finite() && settings.initial_step > 0.0) {
        bail!("Initial step size must be positive.");
    }
    if !(settings.step_floor > 0.0) {
        bail!("Step floor must be positive.");
    }

    let cord = config.reference_cord();
    let reference = config.reference_depth;
    let mut attempts = Vec::new();
    let mut step = settings.initial_step;

    for _ in 0..=settings.max_halvings {
        if step < settings.step_floor {
            break;
        }
        let drop_settings = search_drop_settings(integrator, step);
        let result = simulate_drop(config, cord, false, &drop_settings)?;
        let relative_error = if result.is_diverged() {
            f64::INFINITY
        } else {
            (reference - result.max_depth).abs() / reference.abs()
        };
        attempts.push(StepAttempt {
            step_size: step,
            max_depth: result.max_depth,
            relative_error,
        });
        debug!(step, max_depth = result.max_depth, relative_error, "step-size attempt");

        if relative_error < settings.tolerance {
            info!(?integrator, step, relative_error, "step size found");
            return Ok(StepSizeReport {
                step_size: step,
                relative_error,
                attempts,
            });
        }
        step /= 2.0;
    }

    let (last_step, last_error) = attempts
        .last()
        .map(|a| (a.step_size, a.relative_error))
        .unwrap_or((step, f64::INFINITY));
    Err(SimulationError::StepSizeNotFound {
        tolerance: settings.tolerance,
        last_step,
        last_error,
    }
    .into())
}

fn check_reference(config: &JumpConfig) -> Result<()> {
    if !(config.reference_stiffness > 0.0) {
        bail!("Configuration has no reference cord.");
    }
    if !(config.reference_depth.is_finite() && config.reference_depth != 0.0) {
        bail!("Configuration has no reference depth.");
    }
    Ok(())
}
