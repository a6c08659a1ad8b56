//! Error module for the layered SNN library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq, Clone)]
pub enum SNNError {
    /// Error for invalid parameters, e.g., a non-positive time step or a probability outside [0, 1].
    InvalidParameters(String),
    /// Error for sizes that cannot be partitioned as requested, e.g., nodes not divisible by the number of modules.
    IncompatibleTopology(String),
    /// Error for out of bounds access, e.g., layer index not found.
    OutOfBounds(String),
    /// Error for matrices whose shape does not match the layers they connect.
    ShapeMismatch {
        context: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// Error for invalid delay values, e.g., zero delays or delays beyond the lookback window.
    InvalidDelay(String),
    /// Error for invalid operation, e.g., ticking a network out of sequence.
    InvalidOperation(String),
    /// Error for I/O operations.
    IOError(String),
}

impl SNNError {
    /// Returns true for errors raised while configuring a network, i.e., before any simulation step.
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, SNNError::InvalidOperation(_) | SNNError::IOError(_))
    }
}

impl fmt::Display for SNNError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SNNError::InvalidParameters(e) => write!(f, "Invalid parameters: {}", e),
            SNNError::IncompatibleTopology(e) => write!(f, "Incompatible topology: {}", e),
            SNNError::OutOfBounds(e) => write!(f, "Index out of bounds: {}", e),
            SNNError::ShapeMismatch {
                context,
                expected,
                found,
            } => write!(
                f,
                "Shape mismatch for {}: expected {}x{}, found {}x{}",
                context, expected.0, expected.1, found.0, found.1
            ),
            SNNError::InvalidDelay(e) => write!(f, "Invalid delay: {}", e),
            SNNError::InvalidOperation(e) => write!(f, "Invalid operation: {}", e),
            SNNError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for SNNError {}
