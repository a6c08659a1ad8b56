//! Izhikevich neurons, a two-variable adaptive model.
//!
//! The potential follows `dV/dt = 0.04 V^2 + 5 V + 140 - U + I` and the recovery variable `dU/dt = a (b V - U)`.
//! The potential is integrated with the fourth-order Runge-Kutta method (the recovery variable held constant),
//! then the recovery variable takes a forward Euler step using the updated potential.
//! After firing, the potential is reset to `c` and the recovery variable is bumped by `d`.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::NeuronModel;
use crate::error::SNNError;
use crate::utils::{jitter, JITTER};

/// Initial value of the recovery variable.
pub const INITIAL_RECOVERY: f64 = -1.0;

/// Named parameter sets `(a, b, c, d)` reproducing typical firing patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IzhikevichPreset {
    /// Regular spiking, typical of excitatory neurons.
    RegularSpiking,
    /// Fast spiking, typical of inhibitory neurons.
    FastSpiking,
    /// Bursting.
    Bursting,
}

impl IzhikevichPreset {
    /// Returns the nominal `(a, b, c, d)` parameters.
    pub fn params(&self) -> (f64, f64, f64, f64) {
        match self {
            IzhikevichPreset::RegularSpiking => (0.02, 0.2, -65.0, 8.0),
            IzhikevichPreset::FastSpiking => (0.02, 0.25, -65.0, 2.0),
            IzhikevichPreset::Bursting => (0.02, 0.2, -50.0, 2.0),
        }
    }
}

impl FromStr for IzhikevichPreset {
    type Err = SNNError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(IzhikevichPreset::RegularSpiking),
            "fast" => Ok(IzhikevichPreset::FastSpiking),
            "burst" => Ok(IzhikevichPreset::Bursting),
            other => Err(SNNError::InvalidParameters(format!(
                "Unknown Izhikevich preset '{}', expected one of: regular, fast, burst",
                other
            ))),
        }
    }
}

impl fmt::Display for IzhikevichPreset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IzhikevichPreset::RegularSpiking => write!(f, "regular"),
            IzhikevichPreset::FastSpiking => write!(f, "fast"),
            IzhikevichPreset::Bursting => write!(f, "burst"),
        }
    }
}

/// A population of Izhikevich neurons with per-neuron parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IzhikevichModel {
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
    /// The recovery variable of each neuron.
    recovery: Vec<f64>,
}

impl IzhikevichModel {
    /// Create a population whose parameters are jittered around the given preset.
    pub fn new<R: Rng>(num_neurons: usize, preset: IzhikevichPreset, rng: &mut R) -> Self {
        let (a, b, c, d) = preset.params();
        IzhikevichModel {
            a: jitter(a, num_neurons, JITTER, rng),
            b: jitter(b, num_neurons, JITTER, rng),
            c: jitter(c, num_neurons, JITTER, rng),
            d: jitter(d, num_neurons, JITTER, rng),
            recovery: vec![INITIAL_RECOVERY; num_neurons],
        }
    }

    /// Create a population where every neuron has exactly the preset parameters.
    pub fn from_preset(num_neurons: usize, preset: IzhikevichPreset) -> Self {
        let (a, b, c, d) = preset.params();
        IzhikevichModel {
            a: vec![a; num_neurons],
            b: vec![b; num_neurons],
            c: vec![c; num_neurons],
            d: vec![d; num_neurons],
            recovery: vec![INITIAL_RECOVERY; num_neurons],
        }
    }

    /// Create a population with explicit per-neuron parameters.
    /// The function returns an error if the parameter vectors differ in length.
    pub fn from_params(
        a: Vec<f64>,
        b: Vec<f64>,
        c: Vec<f64>,
        d: Vec<f64>,
    ) -> Result<Self, SNNError> {
        let num_neurons = a.len();
        if [b.len(), c.len(), d.len()].iter().any(|&len| len != num_neurons) {
            return Err(SNNError::InvalidParameters(format!(
                "Izhikevich parameters must have the same length, got {}, {}, {} and {}",
                a.len(),
                b.len(),
                c.len(),
                d.len()
            )));
        }
        Ok(IzhikevichModel {
            a,
            b,
            c,
            d,
            recovery: vec![INITIAL_RECOVERY; num_neurons],
        })
    }

    /// Returns the recovery variable of each neuron.
    pub fn recovery(&self) -> &[f64] {
        &self.recovery
    }
}

fn dvdt(v: f64, u: f64, i: f64) -> f64 {
    0.04 * v * v + 5.0 * v + 140.0 - u + i
}

impl NeuronModel for IzhikevichModel {
    fn num_neurons(&self) -> usize {
        self.a.len()
    }

    fn integrate(&mut self, potential: &mut [f64], input_current: &[f64], dt: f64) {
        for (neuron_id, (v, &i)) in potential.iter_mut().zip(input_current).enumerate() {
            let u = self.recovery[neuron_id];

            let k1 = dvdt(*v, u, i);
            let k2 = dvdt(*v + 0.5 * dt * k1, u, i);
            let k3 = dvdt(*v + 0.5 * dt * k2, u, i);
            let k4 = dvdt(*v + dt * k3, u, i);
            *v += dt / 6.0 * (k1 + 2.0 * k2 + 2.0 * k3 + k4);

            self.recovery[neuron_id] =
                u + dt * (self.a[neuron_id] * (self.b[neuron_id] * *v - u));
        }
    }

    fn reset_potential(&self, neuron_id: usize) -> f64 {
        self.c[neuron_id]
    }

    fn reset_fired(&mut self, potential: &mut [f64], fired: &[usize]) {
        for &neuron_id in fired {
            potential[neuron_id] = self.c[neuron_id];
            self.recovery[neuron_id] += self.d[neuron_id];
        }
    }
}
