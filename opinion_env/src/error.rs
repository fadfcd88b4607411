//! Error types for the opinion environment layer.

use thiserror::Error;

/// Errors raised by oracles and the helpers around them.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The analyzer could not produce a result (transport failure, refusal, etc.)
    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    /// Oracle output was not a usable opinion vector
    #[error("Invalid opinion vector: {0}")]
    InvalidVector(String),

    /// The post generator could not produce text
    #[error("Post generation failed: {0}")]
    GenerationFailed(String),

    /// A post catalog could not be loaded
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// Every retry attempt failed; carries the last error message
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl EnvError {
    /// Creates an analysis error.
    pub fn analysis(msg: impl Into<String>) -> Self {
        Self::AnalysisFailed(msg.into())
    }

    /// Creates an invalid-vector error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidVector(msg.into())
    }
}
