//! Quadratic integrate-and-fire neurons.
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::NeuronModel;
use crate::error::SNNError;
use crate::utils::{jitter, JITTER};

/// Resting potential.
pub const VR: f64 = -65.0;
/// Critical potential, above which the potential escapes towards firing.
pub const VC: f64 = -50.0;
/// Membrane time constant.
pub const TAU: f64 = 5.0;
/// Membrane resistance.
pub const RESISTANCE: f64 = 1.0;
/// Nominal value of the per-neuron coefficient `a`.
pub const NOMINAL_A: f64 = 0.2;

/// A population of quadratic integrate-and-fire neurons, integrated with the forward Euler method:
/// `dV/dt = (a (VR - V)(VC - V) + RESISTANCE I) / TAU`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadraticModel {
    a: Vec<f64>,
}

impl QuadraticModel {
    /// Create a population whose coefficients are jittered around the nominal value.
    pub fn new<R: Rng>(num_neurons: usize, rng: &mut R) -> Self {
        QuadraticModel {
            a: jitter(NOMINAL_A, num_neurons, JITTER, rng),
        }
    }

    /// Create a population with explicit coefficients.
    /// The function returns an error if any coefficient is not finite.
    pub fn from_params(a: Vec<f64>) -> Result<Self, SNNError> {
        if a.iter().any(|a| !a.is_finite()) {
            return Err(SNNError::InvalidParameters(
                "Quadratic coefficients must be finite".to_string(),
            ));
        }
        Ok(QuadraticModel { a })
    }

    pub fn a(&self) -> &[f64] {
        &self.a
    }
}

fn dvdt(a: f64, v: f64, i: f64) -> f64 {
    (a * (VR - v) * (VC - v) + RESISTANCE * i) / TAU
}

impl NeuronModel for QuadraticModel {
    fn num_neurons(&self) -> usize {
        self.a.len()
    }

    fn integrate(&mut self, potential: &mut [f64], input_current: &[f64], dt: f64) {
        for ((v, &i), &a) in potential.iter_mut().zip(input_current).zip(&self.a) {
            *v += dt * dvdt(a, *v, i);
        }
    }

    fn reset_potential(&self, _neuron_id: usize) -> f64 {
        VR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_jittered_coefficients() {
        let mut rng = StdRng::seed_from_u64(42);
        let model = QuadraticModel::new(100, &mut rng);
        assert_eq!(model.num_neurons(), 100);
        assert!(model.a().iter().all(|&a| (0.1899..0.2101).contains(&a)));
        assert!(model.a().windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_fixed_points() {
        let mut model = QuadraticModel::from_params(vec![NOMINAL_A; 2]).unwrap();
        let mut potential = vec![VR, VC];
        model.integrate(&mut potential, &[0.0, 0.0], 0.2);
        assert_eq!(potential, vec![VR, VC]);
    }

    #[test]
    fn test_euler_step() {
        let mut model = QuadraticModel::from_params(vec![NOMINAL_A]).unwrap();
        let mut potential = vec![-60.0];
        model.integrate(&mut potential, &[10.0], 0.5);
        // dV/dt = (0.2 * (-5) * 10 + 10) / 5 = 0
        assert_eq!(potential, vec![-60.0]);
        model.integrate(&mut potential, &[20.0], 0.5);
        // dV/dt = (-10 + 20) / 5 = 2
        assert_eq!(potential, vec![-59.0]);
    }

    #[test]
    fn test_invalid_params() {
        assert!(QuadraticModel::from_params(vec![0.2, f64::NAN]).is_err());
    }
}
