//! Network (with layers and delayed connections) structure and utilities.
//!
//! # Examples
//!
//! ```rust
//! use layered_snn::layer::Layer;
//! use layered_snn::network::Network;
//! use nalgebra::DMatrix;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let layers = vec![Layer::quadratic(4, &mut rng), Layer::quadratic(4, &mut rng)];
//!
//! // Connect layer 0 to layer 1 with all-to-all unit weights, a scale of 25 and a delay of 5 ticks
//! let mut network = Network::build(layers, 5).unwrap();
//! network.connect(1, 0, DMatrix::from_element(4, 4, 1.0), 25.0, 5_usize).unwrap();
//!
//! for t in 0..100 {
//!     network.set_input_current(0, 20.0).unwrap();
//!     network.set_input_current(1, 0.0).unwrap();
//!     network.tick(t).unwrap();
//! }
//! assert!(!network.layer(0).unwrap().firing_history().is_empty());
//! ```
use log;
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::connection::{Connection, Delays, Scale};
use crate::error::SNNError;
use crate::layer::Layer;
use crate::{DEFAULT_TIME_STEP, MIN_PARALLEL_NEURONS};

/// The strategy used to route delayed currents from the firing layers to their targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Delivery {
    /// Currents are scheduled when a source fires, into a per-target buffer of `d_max + 1` slots indexed by
    /// `tick mod (d_max + 1)`. Ticks must then be consecutive.
    #[default]
    RingBuffer,
    /// Currents are recomputed at every tick by scanning the firing histories over the lookback window.
    HistoryScan,
}

/// A connection registered between two layers of the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Projection {
    target: usize,
    source: usize,
    connection: Connection,
}

/// Currents scheduled for delivery to the neurons of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DelayBuffer {
    slots: Vec<Vec<f64>>,
}

impl DelayBuffer {
    fn new(num_slots: usize, size: usize) -> Self {
        DelayBuffer {
            slots: vec![vec![0.0; size]; num_slots],
        }
    }

    /// Add a current to be delivered to the neuron at the given tick.
    fn schedule(&mut self, time: usize, neuron_id: usize, current: f64) {
        let num_slots = self.slots.len();
        self.slots[time % num_slots][neuron_id] += current;
    }

    /// Add the currents due at the given tick to the input currents and clear their slot.
    fn deliver(&mut self, time: usize, input_current: &mut [f64]) {
        let num_slots = self.slots.len();
        for (input, pending) in input_current
            .iter_mut()
            .zip(self.slots[time % num_slots].iter_mut())
        {
            *input += *pending;
            *pending = 0.0;
        }
    }
}

/// A network of layers coupled by weighted and delayed connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    /// The layers, indexed from 0.
    layers: Vec<Layer>,
    /// The connections, sorted by (target, source).
    projections: Vec<Projection>,
    /// The lookback window in ticks, at least as large as any delay.
    d_max: usize,
    /// The integration time step.
    dt: f64,
    /// The number of integration steps per tick.
    substeps: usize,
    delivery: Delivery,
    /// One buffer per layer, used with ring buffer delivery.
    buffers: Vec<DelayBuffer>,
    /// The tick expected next.
    next_tick: usize,
}

impl Network {
    /// Create a network without connections, with the given lookback window.
    /// The function returns an error if the window is shorter than one tick.
    pub fn build(layers: Vec<Layer>, d_max: usize) -> Result<Self, SNNError> {
        if d_max == 0 {
            return Err(SNNError::InvalidParameters(
                "The lookback window d_max must be at least one tick".to_string(),
            ));
        }

        let buffers = layers
            .iter()
            .map(|layer| DelayBuffer::new(d_max + 1, layer.size()))
            .collect();
        let network = Network {
            layers,
            projections: vec![],
            d_max,
            dt: DEFAULT_TIME_STEP,
            substeps: (1.0 / DEFAULT_TIME_STEP).round() as usize,
            delivery: Delivery::default(),
            buffers,
            next_tick: 0,
        };

        log::info!(
            "Network created with {} layers and {} neurons",
            network.num_layers(),
            network.num_neurons()
        );
        Ok(network)
    }

    /// Create a feed-forward network where each layer drives the next one with all-to-all unit weights.
    /// The connection from layer `i - 1` to layer `i` is scaled by `scaling_factor / sqrt(size of layer i - 1)`
    /// and delayed by `delay` ticks, which is also the lookback window.
    pub fn feed_forward(
        layers: Vec<Layer>,
        scaling_factor: f64,
        delay: usize,
    ) -> Result<Self, SNNError> {
        let mut network = Network::build(layers, delay)?;
        for target in 1..network.num_layers() {
            let source = target - 1;
            let (num_targets, num_sources) =
                (network.layers[target].size(), network.layers[source].size());
            network.connect(
                target,
                source,
                DMatrix::from_element(num_targets, num_sources, 1.0),
                scaling_factor / (num_sources as f64).sqrt(),
                delay,
            )?;
        }
        Ok(network)
    }

    /// Set the integration time step. A tick is split into `1 / dt` integration steps.
    /// The function returns an error if `dt` is not in (0, 1] or does not divide the tick evenly.
    pub fn with_time_step(mut self, dt: f64) -> Result<Self, SNNError> {
        if !(dt > 0.0 && dt <= 1.0) {
            return Err(SNNError::InvalidParameters(format!(
                "The time step must lie in (0, 1], got {}",
                dt
            )));
        }
        let substeps = (1.0 / dt).round() as usize;
        if (substeps as f64 * dt - 1.0).abs() > 1e-9 {
            return Err(SNNError::InvalidParameters(format!(
                "The time step {} does not divide a tick evenly",
                dt
            )));
        }
        self.dt = dt;
        self.substeps = substeps;
        Ok(self)
    }

    /// Set the strategy used to deliver delayed currents.
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Connect the source layer to the target layer.
    /// See [`Connection::build`] and [`Network::add_connection`] for the possible errors.
    pub fn connect(
        &mut self,
        target: usize,
        source: usize,
        weights: DMatrix<f64>,
        scale: impl Into<Scale>,
        delays: impl Into<Delays>,
    ) -> Result<(), SNNError> {
        let connection = Connection::build(weights, scale, delays)?;
        self.add_connection(target, source, connection)
    }

    /// Register a connection from the source layer to the target layer, replacing any previous one between them.
    /// The function returns an error if a layer does not exist, if the connection shape does not match the layer
    /// sizes, or if a delay exceeds the lookback window. On error, the network is left unchanged.
    pub fn add_connection(
        &mut self,
        target: usize,
        source: usize,
        connection: Connection,
    ) -> Result<(), SNNError> {
        let num_layers = self.num_layers();
        if target >= num_layers || source >= num_layers {
            return Err(SNNError::OutOfBounds(format!(
                "connection {} <- {} in a network of {} layers",
                target, source, num_layers
            )));
        }

        let expected = (self.layers[target].size(), self.layers[source].size());
        if connection.shape() != expected {
            return Err(SNNError::ShapeMismatch {
                context: format!("weights of connection {} <- {}", target, source),
                expected,
                found: connection.shape(),
            });
        }

        if let Some(max_delay) = connection.max_delay() {
            if max_delay > self.d_max {
                return Err(SNNError::InvalidDelay(format!(
                    "delay {} of connection {} <- {} exceeds the lookback window d_max = {}",
                    max_delay, target, source, self.d_max
                )));
            }
        }

        match self
            .projections
            .binary_search_by_key(&(target, source), |p| (p.target, p.source))
        {
            Ok(pos) => self.projections[pos].connection = connection,
            Err(pos) => self.projections.insert(
                pos,
                Projection {
                    target,
                    source,
                    connection,
                },
            ),
        }

        log::debug!("Connection {} <- {} registered", target, source);
        Ok(())
    }

    /// Returns the connection from the source layer to the target layer, if any.
    pub fn connection(&self, target: usize, source: usize) -> Option<&Connection> {
        self.projections
            .binary_search_by_key(&(target, source), |p| (p.target, p.source))
            .ok()
            .map(|pos| &self.projections[pos].connection)
    }

    /// The number of connections between layers.
    pub fn num_connections(&self) -> usize {
        self.projections.len()
    }

    /// The number of layers in the network.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// The total number of neurons in the network.
    pub fn num_neurons(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    /// A reference to a specific layer in the network.
    /// Returns `None` if the layer is not found.
    pub fn layer(&self, layer_id: usize) -> Option<&Layer> {
        self.layers.get(layer_id)
    }

    fn layer_checked_mut(&mut self, layer_id: usize) -> Result<&mut Layer, SNNError> {
        let num_layers = self.layers.len();
        self.layers.get_mut(layer_id).ok_or_else(|| {
            SNNError::OutOfBounds(format!(
                "layer {} in a network of {} layers",
                layer_id, num_layers
            ))
        })
    }

    /// Set the input current of every neuron of a layer to the same value.
    /// The function returns an error if the layer does not exist.
    pub fn set_input_current(&mut self, layer_id: usize, value: f64) -> Result<(), SNNError> {
        self.layer_checked_mut(layer_id)?.set_input_current(value);
        Ok(())
    }

    /// Add a current to a single neuron of a layer.
    /// The function returns an error if the layer or the neuron does not exist.
    pub fn add_input_current(
        &mut self,
        layer_id: usize,
        neuron_id: usize,
        value: f64,
    ) -> Result<(), SNNError> {
        self.layer_checked_mut(layer_id)?
            .add_input_current(neuron_id, value)
    }

    /// Overwrite the membrane potentials of a layer.
    /// The function returns an error if the layer does not exist or if the number of values does not match its size.
    pub fn set_potential(&mut self, layer_id: usize, potential: &[f64]) -> Result<(), SNNError> {
        self.layer_checked_mut(layer_id)?.set_potential(potential)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn d_max(&self) -> usize {
        self.d_max
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn substeps(&self) -> usize {
        self.substeps
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    /// The tick the network expects next, i.e., one past the last simulated tick.
    pub fn next_tick(&self) -> usize {
        self.next_tick
    }

    /// Returns the currents reaching the target layer at the given tick, computed from the firing histories
    /// of its source layers over the lookback window.
    fn delayed_input(&self, target: usize, time: usize) -> Vec<f64> {
        let mut current = vec![0.0; self.layers[target].size()];
        let cutoff = time.saturating_sub(self.d_max);

        for projection in self.projections.iter().filter(|p| p.target == target) {
            let connection = &projection.connection;
            for firing in self.layers[projection.source].firings_since(cutoff) {
                let elapsed = match time.checked_sub(firing.time) {
                    Some(elapsed) => elapsed,
                    None => continue,
                };
                for (i, c) in current.iter_mut().enumerate() {
                    if connection.delay(i, firing.neuron_id) == elapsed {
                        *c += connection.efficacy(i, firing.neuron_id);
                    }
                }
            }
        }

        current
    }

    /// Schedule the currents caused by the firings of the given tick into the buffers of their targets.
    fn schedule_firings(&mut self, time: usize) {
        for projection in self.projections.iter() {
            let connection = &projection.connection;
            let buffer = &mut self.buffers[projection.target];
            for firing in self.layers[projection.source].firings_since(time) {
                for i in 0..connection.shape().0 {
                    let current = connection.efficacy(i, firing.neuron_id);
                    if current != 0.0 {
                        buffer.schedule(
                            time + connection.delay(i, firing.neuron_id),
                            i,
                            current,
                        );
                    }
                }
            }
        }
    }

    /// Advance every layer by one tick, in index order.
    /// The delayed currents of all connections are added to the input currents set by the caller, then each layer
    /// integrates its dynamics. A layer only sees the others through their firing histories, so layers may be
    /// advanced in parallel.
    /// The function returns an error if `time` precedes the tick expected next, so that firing histories stay
    /// chronological. With ring buffer delivery, `time` must be exactly the tick expected next.
    pub fn tick(&mut self, time: usize) -> Result<(), SNNError> {
        let in_sequence = match self.delivery {
            Delivery::RingBuffer => time == self.next_tick,
            Delivery::HistoryScan => time >= self.next_tick,
        };
        if !in_sequence {
            return Err(SNNError::InvalidOperation(format!(
                "tick {} requested while the network expects tick {}",
                time, self.next_tick
            )));
        }

        let (dt, substeps) = (self.dt, self.substeps);
        let parallel = self.num_neurons() >= MIN_PARALLEL_NEURONS;

        match self.delivery {
            Delivery::RingBuffer => {
                if parallel {
                    self.layers
                        .par_iter_mut()
                        .zip(self.buffers.par_iter_mut())
                        .for_each(|(layer, buffer)| {
                            buffer.deliver(time, layer.input_current_mut());
                            layer.step_potential(time, dt, substeps);
                        });
                } else {
                    self.layers
                        .iter_mut()
                        .zip(self.buffers.iter_mut())
                        .for_each(|(layer, buffer)| {
                            buffer.deliver(time, layer.input_current_mut());
                            layer.step_potential(time, dt, substeps);
                        });
                }
                self.schedule_firings(time);
            }
            Delivery::HistoryScan => {
                let delayed: Vec<Vec<f64>> = if parallel {
                    (0..self.num_layers())
                        .into_par_iter()
                        .map(|target| self.delayed_input(target, time))
                        .collect()
                } else {
                    (0..self.num_layers())
                        .map(|target| self.delayed_input(target, time))
                        .collect()
                };

                let advance = |(layer, current): (&mut Layer, Vec<f64>)| {
                    layer
                        .input_current_mut()
                        .iter_mut()
                        .zip(current)
                        .for_each(|(input, c)| *input += c);
                    layer.step_potential(time, dt, substeps);
                };
                if parallel {
                    self.layers
                        .par_iter_mut()
                        .zip(delayed.into_par_iter())
                        .for_each(advance);
                } else {
                    self.layers.iter_mut().zip(delayed).for_each(advance);
                }
            }
        }

        self.next_tick = time + 1;
        Ok(())
    }

    /// Save the network to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SNNError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| SNNError::IOError(e.to_string()))
    }

    /// Load a network from a file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SNNError> {
        let file = File::open(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| SNNError::IOError(e.to_string()))
    }
}
