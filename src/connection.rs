//! Module implementing the concept of connections between layers.
//!
//! A connection from a source layer to a target layer carries a weight matrix `S`, a scale and a delay matrix,
//! all of shape `(target size, source size)`: entry `(i, j)` describes the synapse from source neuron `j` to
//! target neuron `i`. A firing of `j` at tick `t` adds `scale(i, j) * S(i, j)` to the input current of `i`
//! at tick `t + delay(i, j)`.
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::SNNError;

/// The scaling applied to the weights of a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scale {
    /// One factor for every synapse.
    Uniform(f64),
    /// One factor per synapse.
    PerSynapse(DMatrix<f64>),
}

impl From<f64> for Scale {
    fn from(scale: f64) -> Self {
        Scale::Uniform(scale)
    }
}

impl From<DMatrix<f64>> for Scale {
    fn from(scale: DMatrix<f64>) -> Self {
        Scale::PerSynapse(scale)
    }
}

/// The conduction delays of a connection, in ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum Delays {
    /// The same delay for every synapse.
    Uniform(usize),
    /// One delay per synapse.
    PerSynapse(DMatrix<usize>),
}

impl From<usize> for Delays {
    fn from(delay: usize) -> Self {
        Delays::Uniform(delay)
    }
}

impl From<DMatrix<usize>> for Delays {
    fn from(delays: DMatrix<usize>) -> Self {
        Delays::PerSynapse(delays)
    }
}

/// Represents a weighted and delayed connection from a source layer to a target layer.
/// Connections are immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Synaptic strengths, of shape (target size, source size).
    weights: DMatrix<f64>,
    /// Scaling of the synaptic strengths.
    scale: Scale,
    /// Conduction delays in ticks, of the same shape as the weights.
    delays: DMatrix<usize>,
}

impl Connection {
    /// Create a new connection with the specified parameters.
    /// Returns an error if the scale or delay matrices do not match the weights, or if any delay is zero.
    pub fn build(
        weights: DMatrix<f64>,
        scale: impl Into<Scale>,
        delays: impl Into<Delays>,
    ) -> Result<Self, SNNError> {
        let scale = scale.into();
        if let Scale::PerSynapse(matrix) = &scale {
            if matrix.shape() != weights.shape() {
                return Err(SNNError::ShapeMismatch {
                    context: "connection scale".to_string(),
                    expected: weights.shape(),
                    found: matrix.shape(),
                });
            }
        }

        let delays = match delays.into() {
            Delays::Uniform(delay) => DMatrix::from_element(weights.nrows(), weights.ncols(), delay),
            Delays::PerSynapse(matrix) => {
                if matrix.shape() != weights.shape() {
                    return Err(SNNError::ShapeMismatch {
                        context: "connection delays".to_string(),
                        expected: weights.shape(),
                        found: matrix.shape(),
                    });
                }
                matrix
            }
        };

        if let Some((pos, _)) = delays.iter().enumerate().find(|(_, &d)| d == 0) {
            let (i, j) = (pos % delays.nrows(), pos / delays.nrows());
            return Err(SNNError::InvalidDelay(format!(
                "Connection delays must be at least one tick, found 0 at ({}, {})",
                i, j
            )));
        }

        Ok(Connection {
            weights,
            scale,
            delays,
        })
    }

    /// Returns the shape (target size, source size) of the connection.
    pub fn shape(&self) -> (usize, usize) {
        self.weights.shape()
    }

    /// Returns the weight matrix of the connection.
    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    /// Returns the scale of the connection.
    pub fn scale(&self) -> &Scale {
        &self.scale
    }

    /// Returns the delay matrix of the connection.
    pub fn delays(&self) -> &DMatrix<usize> {
        &self.delays
    }

    /// Returns the delay from source neuron `j` to target neuron `i`.
    pub fn delay(&self, i: usize, j: usize) -> usize {
        self.delays[(i, j)]
    }

    /// Returns the largest delay of the connection, if any synapse exists.
    pub fn max_delay(&self) -> Option<usize> {
        self.delays.iter().copied().max()
    }

    /// Returns the scaled strength of the synapse from source neuron `j` to target neuron `i`.
    pub fn efficacy(&self, i: usize, j: usize) -> f64 {
        match &self.scale {
            Scale::Uniform(scale) => scale * self.weights[(i, j)],
            Scale::PerSynapse(scale) => scale[(i, j)] * self.weights[(i, j)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_build() {
        let connection = Connection::build(DMatrix::from_element(2, 3, 1.0), 0.5, 4_usize).unwrap();
        assert_eq!(connection.shape(), (2, 3));
        assert_eq!(connection.delays(), &DMatrix::from_element(2, 3, 4));
        assert_eq!(connection.max_delay(), Some(4));
        assert_eq!(connection.efficacy(1, 2), 0.5);
    }

    #[test]
    fn test_connection_per_synapse() {
        let weights = DMatrix::from_row_slice(2, 2, &[1.0, -2.0, 0.5, 0.0]);
        let scale = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 4.0, 3.0]);
        let delays = DMatrix::from_row_slice(2, 2, &[1_usize, 2, 3, 4]);
        let connection = Connection::build(weights, scale, delays).unwrap();
        assert_eq!(connection.efficacy(0, 0), 2.0);
        assert_eq!(connection.efficacy(0, 1), -2.0);
        assert_eq!(connection.efficacy(1, 0), 2.0);
        assert_eq!(connection.efficacy(1, 1), 0.0);
        assert_eq!(connection.delay(1, 0), 3);
        assert_eq!(connection.max_delay(), Some(4));
    }

    #[test]
    fn test_connection_invalid_shapes() {
        let weights = DMatrix::from_element(2, 2, 1.0);
        assert!(matches!(
            Connection::build(weights.clone(), DMatrix::from_element(2, 3, 1.0), 1_usize),
            Err(SNNError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            Connection::build(weights, 1.0, DMatrix::from_element(3, 2, 1_usize)),
            Err(SNNError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_connection_invalid_delay() {
        let delays = DMatrix::from_row_slice(2, 2, &[1_usize, 2, 0, 4]);
        assert_eq!(
            Connection::build(DMatrix::from_element(2, 2, 1.0), 1.0, delays),
            Err(SNNError::InvalidDelay(
                "Connection delays must be at least one tick, found 0 at (1, 0)".to_string()
            ))
        );
        assert!(matches!(
            Connection::build(DMatrix::from_element(2, 2, 1.0), 1.0, 0_usize),
            Err(SNNError::InvalidDelay(_))
        ));
    }
}
