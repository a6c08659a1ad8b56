//! This module provides generators for structured connectivity matrices.
//!
//! Matrices follow the connection convention of the network: entry `(i, j)` links node `j` (source) to node `i` (target).
//!
//! # Examples
//!
//! ```rust
//! use layered_snn::topology::{FocalNetwork, ModularNetwork};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//!
//! // A small-world network: 8 modules of 100 nodes, 1000 edges per module, 20% of the edges rewired.
//! let small_world = ModularNetwork::build(800, 8000, 8, &mut rng)
//!     .unwrap()
//!     .rewire(0.2, &mut rng)
//!     .unwrap();
//! assert!(small_world.num_connections() <= 8000);
//!
//! // A focal network: each of the 1600 targets receives 4 inputs from its module among 800 sources.
//! let focal = FocalNetwork::build(8, (1600, 800), 4, &mut rng).unwrap();
//! assert_eq!(focal.num_connections(), 1600 * 4);
//! ```
use itertools::iproduct;
use log;
use nalgebra::DMatrix;
use rand::seq::index;
use rand::Rng;

use crate::error::SNNError;

/// A modular network, i.e., nodes partitioned into equal-size contiguous modules with intra-module edges only.
/// Rewiring turns it into a modular small-world network.
#[derive(Debug, PartialEq, Clone)]
pub struct ModularNetwork {
    /// The number of nodes in the network.
    num_nodes: usize,
    /// The number of modules.
    num_modules: usize,
    /// The connectivity matrix with 0/1 entries.
    matrix: DMatrix<f64>,
}

impl ModularNetwork {
    /// Create a modular network with `num_nodes` nodes split into `num_modules` modules.
    /// Each module receives exactly `num_edges / num_modules` distinct directed edges without self-loops.
    /// The function returns an error if the nodes cannot be split evenly or if a module cannot host its edges.
    pub fn build<R: Rng>(
        num_nodes: usize,
        num_edges: usize,
        num_modules: usize,
        rng: &mut R,
    ) -> Result<Self, SNNError> {
        if num_modules == 0 || num_nodes == 0 {
            return Err(SNNError::InvalidParameters(format!(
                "A modular network needs at least one node and one module (got {} nodes, {} modules)",
                num_nodes, num_modules
            )));
        }
        if num_nodes % num_modules != 0 {
            return Err(SNNError::IncompatibleTopology(format!(
                "{} nodes cannot be split into {} equal-size modules",
                num_nodes, num_modules
            )));
        }

        let module_size = num_nodes / num_modules;
        let edges_per_module = num_edges / num_modules;
        if edges_per_module > module_size * (module_size - 1) {
            return Err(SNNError::IncompatibleTopology(format!(
                "A module of {} nodes cannot host {} distinct edges without self-loops",
                module_size, edges_per_module
            )));
        }

        let mut network = ModularNetwork {
            num_nodes,
            num_modules,
            matrix: DMatrix::zeros(num_nodes, num_nodes),
        };
        for module in 0..num_modules {
            network.init_module(module, edges_per_module, rng);
        }

        log::debug!(
            "Modular network generated: {} nodes, {} modules, {} edges",
            num_nodes,
            num_modules,
            network.num_connections()
        );
        Ok(network)
    }

    /// Draw random node pairs within the module until it holds `num_edges` distinct edges.
    fn init_module<R: Rng>(&mut self, module: usize, num_edges: usize, rng: &mut R) {
        let lower = module * self.module_size();
        let upper = lower + self.module_size();

        let mut count = 0;
        while count < num_edges {
            let i = rng.gen_range(lower..upper);
            let j = rng.gen_range(lower..upper);
            if i != j && self.matrix[(i, j)] == 0.0 {
                self.matrix[(i, j)] = 1.0;
                count += 1;
            }
        }
    }

    /// Rewire every existing edge `(i, j)` with probability `p` towards a random node of another module.
    /// The edge is first removed, then `(i, k)` is added for a node `k` drawn uniformly from a module other than the one of `i`.
    /// If `(i, k)` already exists, the edge is lost: collisions are not retried.
    /// The function returns an error if `p` is not a probability or if there is no other module to rewire to.
    pub fn rewire<R: Rng>(mut self, p: f64, rng: &mut R) -> Result<Self, SNNError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(SNNError::InvalidParameters(format!(
                "Rewiring probability must lie in [0, 1], got {}",
                p
            )));
        }
        if p > 0.0 && self.num_modules < 2 {
            return Err(SNNError::IncompatibleTopology(
                "Rewiring requires at least two modules".to_string(),
            ));
        }

        let module_size = self.module_size();
        let mut num_collisions = 0;
        for (i, j) in self.connected_pairs() {
            if !rng.gen_bool(p) {
                continue;
            }

            let own_module = self.module_of(i);
            let mut target_module = rng.gen_range(0..self.num_modules - 1);
            if target_module >= own_module {
                target_module += 1;
            }
            let target_node = target_module * module_size + rng.gen_range(0..module_size);

            self.matrix[(i, j)] = 0.0;
            if self.matrix[(i, target_node)] != 0.0 {
                log::trace!("Edge ({}, {}) lost: ({}, {}) already exists", i, j, i, target_node);
                num_collisions += 1;
            }
            self.matrix[(i, target_node)] = 1.0;
        }

        log::debug!(
            "Network rewired with p={}: {} edges left, {} collisions",
            p,
            self.num_connections(),
            num_collisions
        );
        Ok(self)
    }

    /// Returns the `(i, j)` pairs with a nonzero entry, in row-major order.
    pub fn connected_pairs(&self) -> Vec<(usize, usize)> {
        iproduct!(0..self.num_nodes, 0..self.num_nodes)
            .filter(|&(i, j)| self.matrix[(i, j)] != 0.0)
            .collect()
    }

    /// Returns the module hosting the given node.
    pub fn module_of(&self, node: usize) -> usize {
        node / self.module_size()
    }

    /// Returns the number of nodes per module.
    pub fn module_size(&self) -> usize {
        self.num_nodes / self.num_modules
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_modules(&self) -> usize {
        self.num_modules
    }

    /// Returns the number of edges in the network.
    pub fn num_connections(&self) -> usize {
        self.matrix.iter().filter(|&&w| w != 0.0).count()
    }

    /// A reference to the connectivity matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Consume the network and return its connectivity matrix.
    pub fn into_matrix(self) -> DMatrix<f64> {
        self.matrix
    }
}

/// A focal network, i.e., a bipartite connectivity where each target node draws a fixed number of inputs
/// from the source module with the same index as its own module.
#[derive(Debug, PartialEq, Clone)]
pub struct FocalNetwork {
    /// The number of modules on both sides.
    num_modules: usize,
    /// The number of inputs per target node.
    focal_width: usize,
    /// The connectivity matrix with 0/1 entries, of shape (target size, source size).
    matrix: DMatrix<f64>,
}

impl FocalNetwork {
    /// Create a focal network between `num_targets` target nodes and `num_sources` source nodes.
    /// The function returns an error if either side cannot be split into `num_modules` equal-size modules,
    /// or if `focal_width` exceeds the size of a source module.
    pub fn build<R: Rng>(
        num_modules: usize,
        (num_targets, num_sources): (usize, usize),
        focal_width: usize,
        rng: &mut R,
    ) -> Result<Self, SNNError> {
        if num_modules == 0 {
            return Err(SNNError::InvalidParameters(
                "A focal network needs at least one module".to_string(),
            ));
        }
        if num_targets % num_modules != 0 || num_sources % num_modules != 0 {
            return Err(SNNError::IncompatibleTopology(format!(
                "Dimensions [{}, {}] cannot be split into {} equal-size modules",
                num_targets, num_sources, num_modules
            )));
        }

        let target_module_size = num_targets / num_modules;
        let source_module_size = num_sources / num_modules;
        if focal_width > source_module_size {
            return Err(SNNError::IncompatibleTopology(format!(
                "Focal width {} exceeds the {} nodes of a source module",
                focal_width, source_module_size
            )));
        }

        let mut matrix = DMatrix::zeros(num_targets, num_sources);
        for module in 0..num_modules {
            let source_base = module * source_module_size;
            let target_base = module * target_module_size;
            for i in target_base..target_base + target_module_size {
                for offset in index::sample(rng, source_module_size, focal_width).into_iter() {
                    matrix[(i, source_base + offset)] = 1.0;
                }
            }
        }

        log::debug!(
            "Focal network generated: [{}, {}] nodes, {} modules, width {}",
            num_targets,
            num_sources,
            num_modules,
            focal_width
        );
        Ok(FocalNetwork {
            num_modules,
            focal_width,
            matrix,
        })
    }

    pub fn num_modules(&self) -> usize {
        self.num_modules
    }

    pub fn focal_width(&self) -> usize {
        self.focal_width
    }

    /// Returns the number of edges in the network.
    pub fn num_connections(&self) -> usize {
        self.matrix.iter().filter(|&&w| w != 0.0).count()
    }

    /// A reference to the connectivity matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Consume the network and return its connectivity matrix.
    pub fn into_matrix(self) -> DMatrix<f64> {
        self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_modular_build_errors() {
        let mut rng = StdRng::seed_from_u64(42);
        assert!(matches!(
            ModularNetwork::build(10, 20, 3, &mut rng),
            Err(SNNError::IncompatibleTopology(_))
        ));
        assert!(matches!(
            ModularNetwork::build(10, 20, 0, &mut rng),
            Err(SNNError::InvalidParameters(_))
        ));
        // 2 modules of 3 nodes host at most 6 edges each
        assert!(matches!(
            ModularNetwork::build(6, 14, 2, &mut rng),
            Err(SNNError::IncompatibleTopology(_))
        ));
    }

    #[test]
    fn test_modular_edge_count_and_structure() {
        let mut rng = StdRng::seed_from_u64(42);
        for (n, m, c) in [(120, 1200, 6), (100, 333, 4), (12, 30, 3), (40, 0, 2)] {
            let network = ModularNetwork::build(n, m, c, &mut rng).unwrap();
            assert_eq!(network.num_connections(), c * (m / c));
            for i in 0..n {
                assert_eq!(network.matrix()[(i, i)], 0.0);
            }
            for (i, j) in network.connected_pairs() {
                assert_eq!(network.module_of(i), network.module_of(j));
            }
            for module in 0..c {
                let count = network
                    .connected_pairs()
                    .iter()
                    .filter(|&&(i, _)| network.module_of(i) == module)
                    .count();
                assert_eq!(count, m / c);
            }
        }
    }

    #[test]
    fn test_modular_full_module() {
        let mut rng = StdRng::seed_from_u64(7);
        let network = ModularNetwork::build(6, 12, 2, &mut rng).unwrap();
        assert_eq!(network.num_connections(), 12);
    }

    #[test]
    fn test_rewire_zero_probability() {
        let mut rng = StdRng::seed_from_u64(42);
        let network = ModularNetwork::build(120, 1200, 6, &mut rng).unwrap();
        let rewired = network.clone().rewire(0.0, &mut rng).unwrap();
        assert_eq!(rewired, network);
    }

    #[test]
    fn test_rewire_full_probability() {
        let mut rng = StdRng::seed_from_u64(42);
        let network = ModularNetwork::build(120, 1200, 6, &mut rng).unwrap();
        let rewired = network.clone().rewire(1.0, &mut rng).unwrap();

        // Edges move or vanish on collision, never multiply
        assert!(rewired.num_connections() <= network.num_connections());
        assert!(rewired.num_connections() > 0);
        for (i, j) in rewired.connected_pairs() {
            assert_ne!(rewired.module_of(i), rewired.module_of(j));
        }
        // Rows keep their origin node: out-edges only shrink through collisions
        for i in 0..120 {
            let before = network.matrix().row(i).iter().filter(|&&w| w != 0.0).count();
            let after = rewired.matrix().row(i).iter().filter(|&&w| w != 0.0).count();
            assert!(after <= before);
        }
    }

    #[test]
    fn test_rewire_collisions_lose_edges() {
        // Two full modules of 3 nodes: both out-edges of a node land among the 3 nodes of the other module,
        // so they regularly collide and one of them is lost.
        let mut lost = false;
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let network = ModularNetwork::build(6, 12, 2, &mut rng)
                .unwrap()
                .rewire(1.0, &mut rng)
                .unwrap();
            assert!(network.num_connections() <= 12);
            lost |= network.num_connections() < 12;
        }
        assert!(lost);
    }

    #[test]
    fn test_rewire_errors() {
        let mut rng = StdRng::seed_from_u64(42);
        let network = ModularNetwork::build(10, 20, 1, &mut rng).unwrap();
        assert!(matches!(
            network.clone().rewire(0.5, &mut rng),
            Err(SNNError::IncompatibleTopology(_))
        ));
        assert!(network.clone().rewire(0.0, &mut rng).is_ok());
        assert!(matches!(
            network.rewire(1.5, &mut rng),
            Err(SNNError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_focal_structure() {
        let mut rng = StdRng::seed_from_u64(42);
        let network = FocalNetwork::build(8, (1600, 800), 4, &mut rng).unwrap();
        let matrix = network.matrix();
        assert_eq!(matrix.shape(), (1600, 800));
        for i in 0..1600 {
            let module = i / 200;
            let columns: Vec<usize> = (0..800).filter(|&j| matrix[(i, j)] != 0.0).collect();
            assert_eq!(columns.len(), 4);
            assert!(columns.iter().all(|&j| j / 100 == module));
        }
    }

    #[test]
    fn test_focal_errors() {
        let mut rng = StdRng::seed_from_u64(42);
        assert!(matches!(
            FocalNetwork::build(3, (10, 9), 2, &mut rng),
            Err(SNNError::IncompatibleTopology(_))
        ));
        assert!(matches!(
            FocalNetwork::build(2, (10, 8), 5, &mut rng),
            Err(SNNError::IncompatibleTopology(_))
        ));
        assert!(FocalNetwork::build(2, (10, 8), 4, &mut rng).is_ok());
    }
}
