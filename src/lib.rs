//! This crate provides tools for simulating layered networks of spiking point-neurons in Rust.
//!
//! # Building Topologies
//!
//! ```rust
//! use layered_snn::topology::{FocalNetwork, ModularNetwork};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//!
//! // A small-world network: 8 modules of 100 nodes with 1000 edges each, rewired with probability 0.1
//! let modular = ModularNetwork::build(800, 8000, 8, &mut rng)
//!     .unwrap()
//!     .rewire(0.1, &mut rng)
//!     .unwrap();
//! assert!(modular.num_connections() <= 8000);
//!
//! // Every target node receives 4 connections from its corresponding source module
//! let focal = FocalNetwork::build(8, (200, 800), 4, &mut rng).unwrap();
//! assert_eq!(focal.num_connections(), 200 * 4);
//! ```
//!
//! # Simulating Networks
//!
//! ```rust
//! use layered_snn::layer::Layer;
//! use layered_snn::network::Network;
//! use layered_snn::neuron::IzhikevichPreset;
//! use layered_snn::simulator::{Simulation, SimulationConfig};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let layers = vec![
//!     Layer::izhikevich(4, IzhikevichPreset::RegularSpiking, &mut rng),
//!     Layer::izhikevich(4, IzhikevichPreset::FastSpiking, &mut rng),
//! ];
//!
//! // Chain the layers with all-to-all connections scaled by 50 / sqrt(4) and delayed by 5 ticks
//! let mut network = Network::feed_forward(layers, 50.0, 5).unwrap();
//!
//! // Drive the first layer with a constant current for 200 ticks
//! let config = SimulationConfig::build(200, 20.0).unwrap().with_seed(7);
//! let trace = Simulation::build(config).unwrap().run(&mut network).unwrap();
//!
//! assert_eq!(trace.potentials(0).unwrap().shape(), (200, 4));
//! assert!(trace.is_finite());
//! ```

pub mod connection;
pub mod error;
pub mod layer;
pub mod network;
pub mod neuron;
pub mod simulator;
pub mod topology;
pub mod utils;

/// The nominal threshold for a neuron to fire.
pub const FIRING_THRESHOLD: f64 = 30.0;
/// The potential of a neuron at rest.
pub const RESTING_POTENTIAL: f64 = -65.0;
/// The default integration time step, i.e., 5 sub-steps per tick.
pub const DEFAULT_TIME_STEP: f64 = 0.2;
/// The value written into potential traces at firing coordinates.
pub const FIRING_PULSE: f64 = 30.0;
/// Minimum number of neurons to consider parallel processing.
pub const MIN_PARALLEL_NEURONS: usize = 100;
