use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in the jump dynamics.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A first-order ODE system `dx/dt = f(t, x)`.
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// t: current time
    /// x: current state
    /// out: buffer to write dx/dt into
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A fixed-step scheme that advances a system by one step.
///
/// Implementors may own scratch buffers, but carry no state from one step to
/// the next: calling `step` twice from the same `(t, state)` gives the same
/// result.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size dt.
    /// t: current time (updated after step)
    /// state: current state (updated after step)
    /// dt: step size
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);
}
