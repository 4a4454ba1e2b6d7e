//! Vector index error types.

use thiserror::Error;

/// Errors that can occur during vector index operations.
///
/// Only `DimensionMismatch` and `NonFiniteComponent` are raised by the index
/// operations themselves.
/// The remaining variants come from construction, snapshot restore, or the
/// snapshot store implementations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// NaN or infinite component, which the snapshot codec cannot carry
    #[error("Non-finite component at position {position}")]
    NonFiniteComponent { position: usize },

    /// Invalid index configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Snapshot is structurally inconsistent
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl VectorError {
    /// Check `actual` against the index dimension.
    pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<(), VectorError> {
        if expected != actual {
            return Err(VectorError::DimensionMismatch { expected, actual });
        }
        Ok(())
    }

    /// Check a vector about to be stored: right length, every component finite.
    pub(crate) fn check_vector(expected: usize, vector: &[f64]) -> Result<(), VectorError> {
        Self::check_dimension(expected, vector.len())?;
        match vector.iter().position(|x| !x.is_finite()) {
            Some(position) => Err(VectorError::NonFiniteComponent { position }),
            None => Ok(()),
        }
    }
}
