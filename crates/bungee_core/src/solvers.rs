use crate::traits::{DynamicalSystem, Scalar, Steppable};
use serde::{Deserialize, Serialize};

/// Explicit (forward) Euler Solver
pub struct Euler<T: Scalar> {
    slope: Vec<T>,
}

impl<T: Scalar> Euler<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            slope: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for Euler<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        // Every component moves along the slope of the same starting state.
        system.apply(*t, state, &mut self.slope);
        for i in 0..state.len() {
            state[i] = state[i] + dt * self.slope[i];
        }
        *t = *t + dt;
    }
}

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![T::zero(); dim],
            k2: vec![T::zero(); dim],
            k3: vec![T::zero(); dim],
            k4: vec![T::zero(); dim],
            tmp: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let half = T::from_f64(0.5).unwrap();
        let sixth = T::from_f64(1.0 / 6.0).unwrap();
        let two = T::from_f64(2.0).unwrap();

        let t0 = *t;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1);

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        // k3 = f(t + dt/2, y + dt*k2/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        // y_next = y + dt/6 * (k1 + 2k2 + 2k3 + k4)
        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

/// Integration scheme selector shared by the drop and history simulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integrator {
    Euler,
    Rk4,
}

impl Integrator {
    /// Theoretical global order of accuracy.
    pub fn order(self) -> u32 {
        match self {
            Integrator::Euler => 1,
            Integrator::Rk4 => 4,
        }
    }

    pub fn build<T: Scalar>(self, dim: usize) -> Stepper<T> {
        match self {
            Integrator::Euler => Stepper::Euler(Euler::new(dim)),
            Integrator::Rk4 => Stepper::Rk4(RK4::new(dim)),
        }
    }
}

/// A constructed solver, dispatched by value so loops stay monomorphic.
pub enum Stepper<T: Scalar> {
    Euler(Euler<T>),
    Rk4(RK4<T>),
}

impl<T: Scalar> Steppable<T> for Stepper<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        match self {
            Stepper::Euler(s) => s.step(system, t, state, dt),
            Stepper::Rk4(s) => s.step(system, t, state, dt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Euler, Integrator, RK4};
    use crate::traits::{DynamicalSystem, Scalar, Steppable};

    #[derive(Clone, Copy)]
    struct LinearSystem {
        rate: f64,
    }

    impl<T: Scalar> DynamicalSystem<T> for LinearSystem {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
            out[0] = T::from_f64(self.rate).unwrap() * x[0];
        }
    }

    /// x'' = -x written as [x, v].
    struct Oscillator;

    impl DynamicalSystem<f64> for Oscillator {
        fn dimension(&self) -> usize {
            2
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = x[1];
            out[1] = -x[0];
        }
    }

    fn integrate(
        integrator: Integrator,
        system: &impl DynamicalSystem<f64>,
        x0: &[f64],
        steps: usize,
        dt: f64,
    ) -> Vec<f64> {
        let mut stepper = integrator.build::<f64>(x0.len());
        let mut state = x0.to_vec();
        let mut t = 0.0;
        for _ in 0..steps {
            stepper.step(system, &mut t, &mut state, dt);
        }
        state
    }

    #[test]
    fn euler_single_step_matches_hand_computation() {
        let mut solver = Euler::new(2);
        let mut state = vec![1.0, 0.5];
        let mut t = 0.0;
        solver.step(&Oscillator, &mut t, &mut state, 0.1);
        assert!((state[0] - 1.05).abs() < 1e-15);
        assert!((state[1] - 0.4).abs() < 1e-15);
        assert!((t - 0.1).abs() < 1e-15);
    }

    #[test]
    fn euler_updates_position_from_starting_velocity() {
        // A fresh velocity must not leak into the same step's position update.
        let mut solver = Euler::new(2);
        let mut state = vec![0.0, 0.0];
        let mut t = 0.0;
        solver.step(&Oscillator, &mut t, &mut state, 0.5);
        assert_eq!(state, vec![0.0, 0.0]);
        state[0] = 1.0;
        solver.step(&Oscillator, &mut t, &mut state, 0.5);
        assert_eq!(state[0], 1.0);
        assert_eq!(state[1], -0.5);
    }

    #[test]
    fn rk4_single_step_matches_taylor_expansion() {
        let mut solver = RK4::new(1);
        let mut state = vec![1.0];
        let mut t = 0.0;
        let dt = 0.1_f64;
        solver.step(&LinearSystem { rate: 1.0 }, &mut t, &mut state, dt);
        let taylor = 1.0 + dt + dt * dt / 2.0 + dt.powi(3) / 6.0 + dt.powi(4) / 24.0;
        assert!((state[0] - taylor).abs() < 1e-15);
    }

    #[test]
    fn rk4_works_in_single_precision() {
        let mut solver = RK4::<f32>::new(1);
        let mut state = vec![1.0_f32];
        let mut t = 0.0_f32;
        for _ in 0..10 {
            solver.step(&LinearSystem { rate: -1.0 }, &mut t, &mut state, 0.1);
        }
        assert!((state[0] - (-1.0_f32).exp()).abs() < 1e-5);
        assert!((t - 1.0).abs() < 1e-5);
    }

    #[test]
    fn halving_the_step_scales_error_by_the_method_order() {
        let exact = [1.0_f64.cos(), -1.0_f64.sin()];
        for (integrator, expected_ratio, tolerance) in
            [(Integrator::Euler, 2.0, 0.2), (Integrator::Rk4, 16.0, 1.0)]
        {
            let coarse = integrate(integrator, &Oscillator, &[1.0, 0.0], 50, 0.02);
            let fine = integrate(integrator, &Oscillator, &[1.0, 0.0], 100, 0.01);
            let err_coarse = (coarse[0] - exact[0]).abs();
            let err_fine = (fine[0] - exact[0]).abs();
            let ratio = err_coarse / err_fine;
            assert!(
                (ratio - expected_ratio).abs() < tolerance,
                "{integrator:?}: ratio {ratio}"
            );
            assert!((fine[1] - exact[1]).abs() < 0.01);
        }
    }

    #[test]
    fn integrator_reports_theoretical_order() {
        assert_eq!(Integrator::Euler.order(), 1);
        assert_eq!(Integrator::Rk4.order(), 4);
    }
}
