use thiserror::Error;

/// Failures a caller may want to tell apart from plain input validation.
///
/// These travel inside `anyhow::Error` like every other failure in the crate;
/// use `downcast_ref::<SimulationError>()` to match on them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("Invalid jump configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "Empirical order is undefined: error ratio {error1} / {error2} is not a positive finite number."
    )]
    OrderUndefined { error1: f64, error2: f64 },

    #[error(
        "No step size reached relative error {tolerance} (last step {last_step}, relative error {last_error})."
    )]
    StepSizeNotFound {
        tolerance: f64,
        last_step: f64,
        last_error: f64,
    },
}
