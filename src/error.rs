//! Error types for quorumreg
//!
//! Provides a unified error type for replica, client and harness operations.

use thiserror::Error;

/// Result type alias using RegisterError
pub type Result<T> = std::result::Result<T, RegisterError>;

/// Unified error type for quorumreg operations
#[derive(Debug, Error)]
pub enum RegisterError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Wire Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Replica reported error: {0}")]
    Remote(String),

    // -------------------------------------------------------------------------
    // Quorum Errors
    // -------------------------------------------------------------------------
    /// A single remote call did not complete. Recovered inside a phase.
    #[error("Transport failure on replica {replica}: {reason}")]
    Transport { replica: String, reason: String },

    #[error("Not getting response from majority of replicas ({responded} of {required} required)")]
    NoMajority { responded: usize, required: usize },

    #[error("Key does not exist on a majority of replicas: {0}")]
    KeyNotFound(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Harness Errors
    // -------------------------------------------------------------------------
    #[error("Benchmark error: {0}")]
    Benchmark(String),
}

impl From<bincode::Error> for RegisterError {
    fn from(e: bincode::Error) -> Self {
        RegisterError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for RegisterError {
    fn from(e: serde_json::Error) -> Self {
        RegisterError::Serialization(e.to_string())
    }
}
