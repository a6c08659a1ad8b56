//! Module implementing the point-neuron models driving the layers.
//!
//! A model owns the per-neuron parameters and auxiliary state of a population, while the membrane potentials
//! are owned by the [`Layer`](crate::layer::Layer) and lent to the model at every integration sub-step.
use serde::{Deserialize, Serialize};

pub mod izhikevich;
pub mod quadratic;

pub use izhikevich::{IzhikevichModel, IzhikevichPreset};
pub use quadratic::QuadraticModel;

use crate::{FIRING_THRESHOLD, RESTING_POTENTIAL};

/// The dynamics of a population of point-neurons sharing one model.
pub trait NeuronModel {
    /// The number of neurons described by the model.
    fn num_neurons(&self) -> usize;

    /// Integrate the potentials (and any auxiliary state) forward by `dt` under the given input current.
    fn integrate(&mut self, potential: &mut [f64], input_current: &[f64], dt: f64);

    /// The potential of the neuron right after it fires.
    fn reset_potential(&self, neuron_id: usize) -> f64;

    /// Reset the neurons which just fired.
    fn reset_fired(&mut self, potential: &mut [f64], fired: &[usize]) {
        for &neuron_id in fired {
            potential[neuron_id] = self.reset_potential(neuron_id);
        }
    }

    /// The nominal firing threshold of the model.
    fn firing_threshold(&self) -> f64 {
        FIRING_THRESHOLD
    }

    /// The potential of a neuron at rest, used as initial state.
    fn resting_potential(&self) -> f64 {
        RESTING_POTENTIAL
    }
}

/// The supported neuron models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Model {
    Quadratic(QuadraticModel),
    Izhikevich(IzhikevichModel),
}

impl From<QuadraticModel> for Model {
    fn from(model: QuadraticModel) -> Self {
        Model::Quadratic(model)
    }
}

impl From<IzhikevichModel> for Model {
    fn from(model: IzhikevichModel) -> Self {
        Model::Izhikevich(model)
    }
}

impl NeuronModel for Model {
    fn num_neurons(&self) -> usize {
        match self {
            Model::Quadratic(model) => model.num_neurons(),
            Model::Izhikevich(model) => model.num_neurons(),
        }
    }

    fn integrate(&mut self, potential: &mut [f64], input_current: &[f64], dt: f64) {
        match self {
            Model::Quadratic(model) => model.integrate(potential, input_current, dt),
            Model::Izhikevich(model) => model.integrate(potential, input_current, dt),
        }
    }

    fn reset_potential(&self, neuron_id: usize) -> f64 {
        match self {
            Model::Quadratic(model) => model.reset_potential(neuron_id),
            Model::Izhikevich(model) => model.reset_potential(neuron_id),
        }
    }

    fn reset_fired(&mut self, potential: &mut [f64], fired: &[usize]) {
        match self {
            Model::Quadratic(model) => model.reset_fired(potential, fired),
            Model::Izhikevich(model) => model.reset_fired(potential, fired),
        }
    }

    fn firing_threshold(&self) -> f64 {
        match self {
            Model::Quadratic(model) => model.firing_threshold(),
            Model::Izhikevich(model) => model.firing_threshold(),
        }
    }

    fn resting_potential(&self) -> f64 {
        match self {
            Model::Quadratic(model) => model.resting_potential(),
            Model::Izhikevich(model) => model.resting_potential(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_dispatch() {
        let mut model = Model::from(IzhikevichModel::from_preset(2, IzhikevichPreset::Bursting));
        assert_eq!(model.num_neurons(), 2);
        assert_eq!(model.reset_potential(1), -50.0);
        assert_eq!(model.firing_threshold(), 30.0);

        let mut potential = vec![35.0, -70.0];
        model.reset_fired(&mut potential, &[0]);
        assert_eq!(potential, vec![-50.0, -70.0]);
        match model {
            Model::Izhikevich(model) => assert_eq!(model.recovery(), &[1.0, -1.0]),
            Model::Quadratic(_) => panic!("Unexpected model variant"),
        }
    }
}
