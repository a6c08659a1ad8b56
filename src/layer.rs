//! Module implementing layers, i.e., populations of neurons sharing one model.
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::SNNError;
use crate::neuron::{IzhikevichModel, IzhikevichPreset, Model, NeuronModel, QuadraticModel};
use crate::RESTING_POTENTIAL;

/// A firing event, i.e., a threshold crossing of a neuron during a tick.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct Firing {
    /// The tick during which the neuron fired.
    pub time: usize,
    /// The index of the neuron within its layer.
    pub neuron_id: usize,
}

impl Firing {
    pub fn new(time: usize, neuron_id: usize) -> Self {
        Firing { time, neuron_id }
    }
}

/// A population of neurons sharing one dynamical model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// The membrane potential of each neuron.
    potential: Vec<f64>,
    /// The input current of each neuron, overwritten before every tick.
    input_current: Vec<f64>,
    /// The potential at which a neuron fires.
    firing_threshold: f64,
    /// The firing events, in chronological order.
    firing_history: Vec<Firing>,
    /// The neuron model with its parameters and auxiliary state.
    model: Model,
}

impl Layer {
    /// Create a layer driven by the given model.
    /// All neurons start at the resting potential and use the nominal threshold of the model.
    pub fn new(model: impl Into<Model>) -> Self {
        let model = model.into();
        let size = model.num_neurons();
        Layer {
            potential: vec![model.resting_potential(); size],
            input_current: vec![0.0; size],
            firing_threshold: model.firing_threshold(),
            firing_history: vec![],
            model,
        }
    }

    /// Create a layer of quadratic integrate-and-fire neurons with jittered parameters.
    pub fn quadratic<R: Rng>(size: usize, rng: &mut R) -> Self {
        Layer::new(QuadraticModel::new(size, rng))
    }

    /// Create a layer of Izhikevich neurons with parameters jittered around the preset.
    pub fn izhikevich<R: Rng>(size: usize, preset: IzhikevichPreset, rng: &mut R) -> Self {
        Layer::new(IzhikevichModel::new(size, preset, rng))
    }

    /// Set the firing threshold of the layer.
    pub fn with_firing_threshold(mut self, firing_threshold: f64) -> Self {
        self.firing_threshold = firing_threshold;
        self
    }

    /// Draw the initial potentials uniformly between the resting potential and zero.
    pub fn with_random_potential<R: Rng>(mut self, rng: &mut R) -> Self {
        self.potential
            .iter_mut()
            .for_each(|v| *v = RESTING_POTENTIAL * rng.gen::<f64>());
        self
    }

    /// Returns the number of neurons in the layer.
    pub fn size(&self) -> usize {
        self.potential.len()
    }

    pub fn potential(&self) -> &[f64] {
        &self.potential
    }

    /// Overwrite the membrane potentials.
    /// The function returns an error if the number of values does not match the layer size.
    pub fn set_potential(&mut self, potential: &[f64]) -> Result<(), SNNError> {
        if potential.len() != self.size() {
            return Err(SNNError::ShapeMismatch {
                context: "layer potential".to_string(),
                expected: (self.size(), 1),
                found: (potential.len(), 1),
            });
        }
        self.potential.copy_from_slice(potential);
        Ok(())
    }

    pub fn input_current(&self) -> &[f64] {
        &self.input_current
    }

    /// Set the input current of every neuron to the same value.
    pub fn set_input_current(&mut self, value: f64) {
        self.input_current.iter_mut().for_each(|i| *i = value);
    }

    /// Add a current to a single neuron.
    /// The function returns an error if the neuron does not exist.
    pub fn add_input_current(&mut self, neuron_id: usize, value: f64) -> Result<(), SNNError> {
        let size = self.size();
        match self.input_current.get_mut(neuron_id) {
            Some(i) => {
                *i += value;
                Ok(())
            }
            None => Err(SNNError::OutOfBounds(format!(
                "neuron {} in a layer of {} neurons",
                neuron_id, size
            ))),
        }
    }

    pub(crate) fn input_current_mut(&mut self) -> &mut [f64] {
        &mut self.input_current
    }

    pub fn firing_threshold(&self) -> f64 {
        self.firing_threshold
    }

    /// Returns the firing events, in chronological order.
    pub fn firing_history(&self) -> &[Firing] {
        &self.firing_history
    }

    /// Returns the firing events which happened at or after `cutoff`, most recent first.
    /// The scan stops at the first older event, since the history is chronological.
    pub fn firings_since(&self, cutoff: usize) -> impl Iterator<Item = &Firing> + '_ {
        self.firing_history
            .iter()
            .rev()
            .take_while(move |firing| firing.time >= cutoff)
    }

    /// Discard the firing events older than `cutoff`.
    /// Events are never discarded by the layer itself; this is left to the owner of the simulation.
    pub fn prune_firings_before(&mut self, cutoff: usize) {
        let pos = self
            .firing_history
            .partition_point(|firing| firing.time < cutoff);
        self.firing_history.drain(..pos);
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Advance the layer by one tick, i.e., `substeps` integration steps of length `dt`.
    /// After every sub-step, the neurons at or above threshold are recorded as fired at `time` and reset.
    /// Returns the number of firing events produced during the tick.
    pub fn step_potential(&mut self, time: usize, dt: f64, substeps: usize) -> usize {
        let num_firings = self.firing_history.len();

        for _ in 0..substeps {
            self.model
                .integrate(&mut self.potential, &self.input_current, dt);

            let fired: Vec<usize> = self
                .potential
                .iter()
                .enumerate()
                .filter(|(_, &v)| v >= self.firing_threshold)
                .map(|(neuron_id, _)| neuron_id)
                .collect();

            self.model.reset_fired(&mut self.potential, &fired);
            self.firing_history
                .extend(fired.into_iter().map(|neuron_id| Firing::new(time, neuron_id)));
        }

        self.firing_history.len() - num_firings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neuron::quadratic::NOMINAL_A;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn quadratic_neuron() -> Layer {
        Layer::new(QuadraticModel::from_params(vec![NOMINAL_A]).unwrap())
    }

    /// Mean inter-spike interval of the first neuron, skipping the first spike.
    fn mean_isi(layer: &Layer) -> f64 {
        let times: Vec<usize> = layer
            .firing_history()
            .iter()
            .filter(|firing| firing.neuron_id == 0)
            .map(|firing| firing.time)
            .collect();
        assert!(times.len() > 3, "Too few spikes: {:?}", times);
        (times[times.len() - 1] - times[1]) as f64 / (times.len() - 2) as f64
    }

    #[test]
    fn test_new_layer() {
        let mut rng = StdRng::seed_from_u64(42);
        let layer = Layer::izhikevich(10, IzhikevichPreset::FastSpiking, &mut rng);
        assert_eq!(layer.size(), 10);
        assert_eq!(layer.potential(), vec![-65.0; 10].as_slice());
        assert_eq!(layer.input_current(), vec![0.0; 10].as_slice());
        assert_eq!(layer.firing_threshold(), 30.0);
        assert!(layer.firing_history().is_empty());

        let layer = Layer::quadratic(5, &mut rng)
            .with_firing_threshold(25.0)
            .with_random_potential(&mut rng);
        assert_eq!(layer.firing_threshold(), 25.0);
        assert!(layer.potential().iter().all(|&v| v > -65.0 && v <= 0.0));
    }

    #[test]
    fn test_input_current() {
        let mut layer = quadratic_neuron();
        layer.set_input_current(20.0);
        layer.add_input_current(0, 5.0).unwrap();
        assert_eq!(layer.input_current(), &[25.0]);
        assert!(matches!(
            layer.add_input_current(1, 5.0),
            Err(SNNError::OutOfBounds(_))
        ));
        assert!(layer.set_potential(&[-60.0, -60.0]).is_err());
    }

    #[test]
    fn test_quadratic_silent_below_rheobase() {
        // a (VC - VR)^2 / 4 = 11.25: weaker currents lead to a stable fixed point
        let mut layer = quadratic_neuron();
        layer.set_input_current(10.0);
        for t in 0..500 {
            assert_eq!(layer.step_potential(t, 0.2, 5), 0);
        }
        assert!(layer.potential()[0].is_finite());
    }

    #[test]
    fn test_quadratic_isi_matches_closed_form() {
        // dV/dt = a ((V - m)^2 + k^2) / tau with m = (VR + VC) / 2, so that the time from VR to the threshold is
        // tau / (a k) (atan((30 - m) / k) - atan((VR - m) / k)).
        let (a, i, tau) = (0.2_f64, 20.0_f64, 5.0_f64);
        let m = -57.5_f64;
        let k = ((i - a * 7.5 * 7.5) / a).sqrt();
        let expected = tau / (a * k) * (((30.0 - m) / k).atan() - ((-65.0 - m) / k).atan());

        let mut layer = quadratic_neuron();
        layer.set_input_current(i);
        for t in 0..400 {
            layer.step_potential(t, 0.02, 50);
        }
        assert!(
            (mean_isi(&layer) - expected).abs() < 0.25,
            "ISI {} vs {}",
            mean_isi(&layer),
            expected
        );

        // The coarser default resolution stays within one tick
        let mut layer = quadratic_neuron();
        layer.set_input_current(i);
        for t in 0..400 {
            layer.step_potential(t, 0.2, 5);
        }
        assert!((mean_isi(&layer) - expected).abs() < 1.0);
    }

    #[test]
    fn test_izhikevich_periodic_firing() {
        let mut layer = Layer::new(IzhikevichModel::from_preset(
            1,
            IzhikevichPreset::RegularSpiking,
        ));
        layer.set_input_current(20.0);
        for t in 0..1000 {
            layer.step_potential(t, 0.2, 5);
        }
        let times: Vec<usize> = layer.firing_history().iter().map(|f| f.time).collect();
        // Adaptation settles after a few spikes, then the neuron fires every 23 to 24 ticks
        for w in times[5..].windows(2) {
            assert!((23..=24).contains(&(w[1] - w[0])), "{:?}", times);
        }

        let mut fast = Layer::new(IzhikevichModel::from_preset(1, IzhikevichPreset::FastSpiking));
        fast.set_input_current(20.0);
        for t in 0..1000 {
            fast.step_potential(t, 0.2, 5);
        }
        assert!(fast.firing_history().len() > 2 * times.len());
    }

    #[test]
    fn test_step_resets_fired_neurons() {
        let mut layer = Layer::new(QuadraticModel::from_params(vec![NOMINAL_A; 3]).unwrap());
        layer.set_potential(&[29.0, -65.0, 100.0]).unwrap();
        let num_firings = layer.step_potential(7, 0.2, 1);
        assert_eq!(num_firings, 2);
        assert_eq!(
            layer.firing_history(),
            &[Firing::new(7, 0), Firing::new(7, 2)]
        );
        assert_eq!(layer.potential()[0], -65.0);
        assert_eq!(layer.potential()[2], -65.0);
    }

    #[test]
    fn test_firings_since() {
        let mut layer = quadratic_neuron();
        assert_eq!(layer.firings_since(0).count(), 0);

        layer.firing_history = vec![
            Firing::new(0, 0),
            Firing::new(3, 0),
            Firing::new(8, 0),
            Firing::new(12, 0),
        ];
        assert_eq!(layer.firings_since(13).count(), 0);

        let firings: Vec<&Firing> = layer.firings_since(3).collect();
        assert_eq!(
            firings,
            vec![&Firing::new(12, 0), &Firing::new(8, 0), &Firing::new(3, 0)]
        );
        assert!(firings.windows(2).all(|w| w[0].time > w[1].time));

        // The first event is reachable
        assert_eq!(layer.firings_since(0).count(), 4);
        // Querying again yields the same events
        assert_eq!(layer.firings_since(3).collect::<Vec<_>>(), firings);
    }

    #[test]
    fn test_prune_firings_before() {
        let mut layer = quadratic_neuron();
        layer.firing_history = vec![Firing::new(0, 0), Firing::new(3, 0), Firing::new(8, 0)];
        layer.prune_firings_before(3);
        assert_eq!(layer.firing_history(), &[Firing::new(3, 0), Firing::new(8, 0)]);
        layer.prune_firings_before(100);
        assert!(layer.firing_history().is_empty());
    }
}
