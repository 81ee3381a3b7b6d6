pub mod config;
pub mod convergence;
pub mod error;
pub mod physics;
pub mod search;
pub mod simulation;
pub mod solvers;
/// The `bungee_core` crate simulates the vertical fall of a bungee jumper and
/// uses the simulation to check solvers and dimension cords.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem` (ODEs), `Steppable` (Solvers).
/// - **Physics**: `JumpSystem`, gravity plus a slack/taut power-law cord and optional power-law drag.
/// - **Solvers**: Fixed-step integrators (Euler, RK4).
/// - **Simulation**: first-fall extremum (`simulate_drop`) and full time series (`simulate_history`).
/// - **Convergence**: empirical order estimates and step-size selection against a known depth.
/// - **Search**: grid search of cord parameters against depth and acceleration targets.
pub mod traits;

pub use config::JumpConfig;
pub use error::SimulationError;
pub use physics::{CordParameters, JumpSystem};
pub use solvers::Integrator;
