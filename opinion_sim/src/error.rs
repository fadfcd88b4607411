//! Error types for the simulation harness.

use opinion_core::NetworkError;
use opinion_env::EnvError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Engine error: {0}")]
    Network(#[from] NetworkError),

    #[error("Environment error: {0}")]
    Env(#[from] EnvError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Harness setting out of range
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Post cannot be empty")]
    EmptyPost,
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
