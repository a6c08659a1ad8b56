//! This module contains the simulation driver and the traces it records.
//!
//! A simulation runs a network for a fixed number of ticks. Before every tick, the input layer receives a constant
//! base current, plus an optional background current proportional to a Poisson count of events per neuron, while
//! every other layer starts from zero current. The membrane potentials of every layer are recorded after each tick, and the firing
//! coordinates are finally overlaid with a fixed pulse value for rendering.
use log;
use nalgebra::DMatrix;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::SNNError;
use crate::layer::Firing;
use crate::network::Network;
use crate::FIRING_PULSE;

fn default_firing_pulse() -> f64 {
    FIRING_PULSE
}

/// The parameters of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// The number of ticks to simulate.
    duration: usize,
    /// The constant current fed to the input layer.
    base_current: f64,
    /// The mean number of background events per neuron and tick.
    #[serde(default)]
    background_rate: f64,
    /// The current added per background event.
    #[serde(default)]
    background_magnitude: f64,
    /// The layer receiving the external currents.
    #[serde(default)]
    input_layer: usize,
    /// The value written into the potential traces at firing coordinates.
    #[serde(default = "default_firing_pulse")]
    firing_pulse: f64,
    /// The seed of the random source of the simulation.
    #[serde(default)]
    seed: u64,
}

impl SimulationConfig {
    /// Create a configuration without background current.
    /// The function returns an error if the base current is not finite.
    pub fn build(duration: usize, base_current: f64) -> Result<Self, SNNError> {
        let config = SimulationConfig {
            duration,
            base_current,
            background_rate: 0.0,
            background_magnitude: 0.0,
            input_layer: 0,
            firing_pulse: FIRING_PULSE,
            seed: 0,
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the Poisson background current of the input layer: every tick, each input neuron receives
    /// `magnitude` times a Poisson(`rate`) count of events.
    /// The function returns an error if the rate is negative or if any value is not finite.
    pub fn with_background(mut self, rate: f64, magnitude: f64) -> Result<Self, SNNError> {
        self.background_rate = rate;
        self.background_magnitude = magnitude;
        self.validate()?;
        Ok(self)
    }

    pub fn with_input_layer(mut self, input_layer: usize) -> Self {
        self.input_layer = input_layer;
        self
    }

    pub fn with_firing_pulse(mut self, firing_pulse: f64) -> Self {
        self.firing_pulse = firing_pulse;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<(), SNNError> {
        if !self.base_current.is_finite() {
            return Err(SNNError::InvalidParameters(format!(
                "The base current must be finite, got {}",
                self.base_current
            )));
        }
        if !(self.background_rate.is_finite() && self.background_rate >= 0.0) {
            return Err(SNNError::InvalidParameters(format!(
                "The background rate must be finite and non-negative, got {}",
                self.background_rate
            )));
        }
        if !self.background_magnitude.is_finite() {
            return Err(SNNError::InvalidParameters(format!(
                "The background magnitude must be finite, got {}",
                self.background_magnitude
            )));
        }
        Ok(())
    }

    pub fn duration(&self) -> usize {
        self.duration
    }

    pub fn base_current(&self) -> f64 {
        self.base_current
    }

    pub fn background_rate(&self) -> f64 {
        self.background_rate
    }

    pub fn background_magnitude(&self) -> f64 {
        self.background_magnitude
    }

    pub fn input_layer(&self) -> usize {
        self.input_layer
    }

    pub fn firing_pulse(&self) -> f64 {
        self.firing_pulse
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Save the configuration to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SNNError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| SNNError::IOError(e.to_string()))
    }

    /// Load a configuration from a file. Missing optional fields take their default values.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SNNError> {
        let file = File::open(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        let config: SimulationConfig =
            serde_json::from_reader(reader).map_err(|e| SNNError::IOError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// The potentials and firings recorded during a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationTrace {
    /// The first simulated tick.
    start: usize,
    /// The number of simulated ticks.
    duration: usize,
    /// One matrix of shape (duration, layer size) per layer; row `k` holds the potentials after tick `start + k`.
    potentials: Vec<DMatrix<f64>>,
    /// The firings of each layer during the run, in chronological order.
    firings: Vec<Vec<Firing>>,
}

impl SimulationTrace {
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn duration(&self) -> usize {
        self.duration
    }

    pub fn num_layers(&self) -> usize {
        self.potentials.len()
    }

    /// Returns the potential trace of a layer, if it exists.
    pub fn potentials(&self, layer_id: usize) -> Option<&DMatrix<f64>> {
        self.potentials.get(layer_id)
    }

    /// Returns the firings of a layer during the run, if it exists.
    pub fn firings(&self, layer_id: usize) -> Option<&[Firing]> {
        self.firings.get(layer_id).map(|firings| firings.as_slice())
    }

    /// Returns `true` if every recorded potential is finite.
    pub fn is_finite(&self) -> bool {
        self.potentials
            .iter()
            .all(|trace| trace.iter().all(|v| v.is_finite()))
    }

    /// Save the trace to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|e| SNNError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| SNNError::IOError(e.to_string()))
    }
}

/// A simulation driver with its own seeded random source.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimulationConfig,
    rng: ChaCha8Rng,
    /// The distribution of background events, if any background current is configured.
    background: Option<Poisson<f64>>,
}

impl Simulation {
    /// Create a simulation from the given configuration.
    pub fn build(config: SimulationConfig) -> Result<Self, SNNError> {
        config.validate()?;
        let background = if config.background_rate > 0.0 && config.background_magnitude != 0.0 {
            let poisson = Poisson::new(config.background_rate)
                .map_err(|e| SNNError::InvalidParameters(e.to_string()))?;
            Some(poisson)
        } else {
            None
        };

        Ok(Simulation {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            background,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Set the external currents of every layer for the next tick.
    /// Each input neuron receives `background_magnitude` times its Poisson count of background events.
    fn drive(&mut self, network: &mut Network) -> Result<(), SNNError> {
        let input_layer = self.config.input_layer;
        for layer_id in 0..network.num_layers() {
            if layer_id != input_layer {
                network.set_input_current(layer_id, 0.0)?;
                continue;
            }

            network.set_input_current(layer_id, self.config.base_current)?;
            if let Some(poisson) = &self.background {
                let size = network.layer(layer_id).map_or(0, |layer| layer.size());
                for neuron_id in 0..size {
                    let count = poisson.sample(&mut self.rng);
                    if count > 0.0 {
                        network.add_input_current(
                            layer_id,
                            neuron_id,
                            self.config.background_magnitude * count,
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Run the network for the configured number of ticks, starting at the tick it expects next.
    /// The function returns an error if the input layer does not exist or if a tick fails.
    pub fn run(&mut self, network: &mut Network) -> Result<SimulationTrace, SNNError> {
        if self.config.input_layer >= network.num_layers() {
            return Err(SNNError::OutOfBounds(format!(
                "input layer {} in a network of {} layers",
                self.config.input_layer,
                network.num_layers()
            )));
        }

        let start = network.next_tick();
        let duration = self.config.duration;
        let mut potentials: Vec<DMatrix<f64>> = network
            .layers()
            .iter()
            .map(|layer| DMatrix::zeros(duration, layer.size()))
            .collect();

        log::info!(
            "Simulation of {} ticks started at tick {} ({} layers, {} neurons)",
            duration,
            start,
            network.num_layers(),
            network.num_neurons()
        );

        for step in 0..duration {
            self.drive(network)?;
            network.tick(start + step)?;

            for (layer, trace) in network.layers().iter().zip(potentials.iter_mut()) {
                for (neuron_id, &v) in layer.potential().iter().enumerate() {
                    trace[(step, neuron_id)] = v;
                }
            }

            if (step + 1) % 100 == 0 {
                log::debug!("Simulated {} / {} ticks", step + 1, duration);
            }
        }

        let firings: Vec<Vec<Firing>> = network
            .layers()
            .iter()
            .map(|layer| {
                let history = layer.firing_history();
                let pos = history.partition_point(|firing| firing.time < start);
                history[pos..].to_vec()
            })
            .collect();

        for (trace, layer_firings) in potentials.iter_mut().zip(firings.iter()) {
            for firing in layer_firings {
                trace[(firing.time - start, firing.neuron_id)] = self.config.firing_pulse;
            }
        }

        log::info!(
            "Simulation ended with {} firings",
            firings.iter().map(|f| f.len()).sum::<usize>()
        );

        Ok(SimulationTrace {
            start,
            duration,
            potentials,
            firings,
        })
    }
}
