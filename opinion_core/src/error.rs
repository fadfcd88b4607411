//! Error types for the opinion propagation engine.

use thiserror::Error;

/// Broad class of a [`NetworkError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad constructor arguments. Fatal, raised only while building a network.
    Configuration,
    /// Bad index or vector passed to a mutating call on a live network.
    Bounds,
}

/// Errors raised by the engine.
///
/// Numeric degeneracies (all-zero distance rows, constant rows, agents without
/// neighbors) are never reported here; they resolve through documented fallbacks.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NetworkError {
    /// Constructor argument out of range or inconsistent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Agent or user index outside the permitted range
    #[error("Index {index} out of bounds (limit {limit})")]
    IndexOutOfBounds { index: usize, limit: usize },

    /// Opinion vector length does not match the network's opinion dimension
    #[error("Opinion dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Opinion vector contains a value that cannot be represented (NaN, inf)
    #[error("Invalid opinion value: {0}")]
    InvalidOpinion(String),
}

impl NetworkError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Returns the error class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetworkError::Configuration(_) => ErrorKind::Configuration,
            NetworkError::IndexOutOfBounds { .. }
            | NetworkError::DimensionMismatch { .. }
            | NetworkError::InvalidOpinion(_) => ErrorKind::Bounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(NetworkError::config("bad").kind(), ErrorKind::Configuration);
        assert_eq!(
            NetworkError::IndexOutOfBounds { index: 9, limit: 3 }.kind(),
            ErrorKind::Bounds
        );
        assert_eq!(
            NetworkError::DimensionMismatch { expected: 1, actual: 2 }.kind(),
            ErrorKind::Bounds
        );
    }

    #[test]
    fn test_error_messages() {
        let err = NetworkError::DimensionMismatch { expected: 3, actual: 1 };
        assert_eq!(err.to_string(), "Opinion dimension mismatch: expected 3, got 1");
    }
}
