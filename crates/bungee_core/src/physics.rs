use crate::config::JumpConfig;
use crate::traits::{DynamicalSystem, Scalar};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Elastic law of the cord: force = stiffness * extension^exponent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CordParameters {
    /// k1, in N/m^k2.
    pub stiffness: f64,
    /// k2, dimensionless.
    pub exponent: f64,
}

impl CordParameters {
    pub fn new(stiffness: f64, exponent: f64) -> Result<Self> {
        let cord = Self {
            stiffness,
            exponent,
        };
        cord.validate()?;
        Ok(cord)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.stiffness.is_finite() && self.stiffness > 0.0) {
            bail!("Cord stiffness k1 must be positive (got {}).", self.stiffness);
        }
        if !(self.exponent.is_finite() && self.exponent > 0.0) {
            bail!("Cord exponent k2 must be positive (got {}).", self.exponent);
        }
        Ok(())
    }
}

/// Vertical motion of a jumper on an elastic cord, as the first-order system
/// `[y, v]' = [v, a(y, v)]`.
///
/// Everything the right-hand side depends on is copied in, so evaluating it
/// never touches shared state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpSystem {
    pub mass: f64,
    pub natural_length: f64,
    pub gravity: f64,
    pub cord: CordParameters,
    pub drag: bool,
    pub drag_coefficient: f64,
    pub drag_exponent: f64,
}

impl JumpSystem {
    pub fn new(config: &JumpConfig, cord: CordParameters, drag: bool) -> Self {
        Self {
            mass: config.mass,
            natural_length: config.natural_length,
            gravity: config.gravity,
            cord,
            drag,
            drag_coefficient: config.drag_coefficient,
            drag_exponent: config.drag_exponent,
        }
    }

    /// Restoring force of the cord at depth `y`. Zero while slack, including at `y == L0`.
    pub fn elastic_force<T: Scalar>(&self, y: T) -> T {
        let natural_length = T::from_f64(self.natural_length).unwrap();
        if y <= natural_length {
            return T::zero();
        }
        let k1 = T::from_f64(self.cord.stiffness).unwrap();
        let k2 = T::from_f64(self.cord.exponent).unwrap();
        k1 * (y - natural_length).powf(k2)
    }

    /// Air drag at velocity `v`, signed to oppose the motion.
    ///
    /// |v| is raised to the exponent before re-signing, since a fractional
    /// power of a negative velocity has no real value.
    pub fn drag_force<T: Scalar>(&self, v: T) -> T {
        if !self.drag || v == T::zero() {
            return T::zero();
        }
        let c1 = T::from_f64(self.drag_coefficient).unwrap();
        let c2 = T::from_f64(self.drag_exponent).unwrap();
        v.signum() * c1 * v.abs().powf(c2)
    }

    /// Net downward acceleration.
    pub fn acceleration<T: Scalar>(&self, y: T, v: T) -> T {
        let g = T::from_f64(self.gravity).unwrap();
        let mass = T::from_f64(self.mass).unwrap();
        g - (self.elastic_force(y) + self.drag_force(v)) / mass
    }
}

impl<T: Scalar> DynamicalSystem<T> for JumpSystem {
    fn dimension(&self) -> usize {
        2
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        out[0] = x[1];
        out[1] = self.acceleration(x[0], x[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::{CordParameters, JumpSystem};
    use crate::config::JumpConfig;
    use crate::traits::DynamicalSystem;
    use approx::assert_relative_eq;

    fn system(drag: bool) -> JumpSystem {
        let config = JumpConfig::default();
        JumpSystem::new(&config, config.reference_cord(), drag)
    }

    #[test]
    fn slack_cord_exerts_no_force() {
        let sys = system(false);
        for y in [-5.0, 0.0, 10.0, 30.0, sys.natural_length - 1e-9, sys.natural_length] {
            assert_eq!(sys.elastic_force(y), 0.0, "force at y = {y}");
            assert_eq!(sys.acceleration(y, 3.0), sys.gravity);
        }
    }

    #[test]
    fn taut_cord_follows_power_law() {
        let mut sys = system(false);
        sys.cord = CordParameters {
            stiffness: 13.0,
            exponent: 1.17,
        };
        let extension = 20.0_f64;
        let expected = 13.0 * extension.powf(1.17);
        assert_relative_eq!(
            sys.elastic_force(sys.natural_length + extension),
            expected,
            max_relative = 1e-12
        );
        assert!(sys.elastic_force(sys.natural_length + 21.0) > expected);
    }

    #[test]
    fn elastic_force_is_continuous_at_natural_length() {
        let sys = system(false);
        let just_past = sys.elastic_force(sys.natural_length + 1e-9);
        assert!(just_past > 0.0);
        assert!(just_past < 1e-6);
    }

    #[test]
    fn drag_opposes_motion_in_both_directions() {
        let sys = system(true);
        let down = sys.drag_force(10.0);
        let up = sys.drag_force(-10.0);
        assert_relative_eq!(down, sys.drag_coefficient * 10.0_f64.powf(1.5), max_relative = 1e-12);
        assert_eq!(up, -down);
        assert_eq!(sys.drag_force(0.0), 0.0);
        assert!(sys.acceleration(0.0, 10.0) < sys.gravity);
        assert!(sys.acceleration(0.0, -10.0) > sys.gravity);
    }

    #[test]
    fn drag_flag_disables_drag() {
        let sys = system(false);
        assert_eq!(sys.drag_force(25.0), 0.0);
        assert_eq!(sys.acceleration(0.0, 25.0), sys.gravity);
    }

    #[test]
    fn net_acceleration_combines_gravity_cord_and_drag() {
        let sys = system(true);
        let y = sys.natural_length + 10.0;
        let v = 4.0;
        let expected = sys.gravity
            - (sys.cord.stiffness * 10.0 + sys.drag_coefficient * 4.0_f64.powf(1.5)) / sys.mass;
        assert_relative_eq!(sys.acceleration(y, v), expected, max_relative = 1e-12);
    }

    #[test]
    fn vector_field_is_velocity_and_acceleration() {
        let sys = system(false);
        let mut out = [0.0; 2];
        let y = sys.natural_length + 5.0;
        sys.apply(0.0, &[y, 7.0], &mut out);
        assert_eq!(out[0], 7.0);
        assert_eq!(out[1], sys.acceleration(y, 7.0));
        assert_eq!(DynamicalSystem::<f64>::dimension(&sys), 2);
    }

    #[test]
    fn cord_parameters_reject_non_positive_values() {
        assert!(CordParameters::new(13.0, 1.17).is_ok());
        let err = CordParameters::new(0.0, 1.0).unwrap_err();
        assert!(format!("{err}").contains("stiffness"));
        let err = CordParameters::new(1.0, -2.0).unwrap_err();
        assert!(format!("{err}").contains("exponent"));
    }
}
