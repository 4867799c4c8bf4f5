//! Core error types

use thiserror::Error;

/// Core error type for Custodia
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration rejected by validation
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    /// Identity record failed validation
    #[error("Invalid entity '{id}': {reason}")]
    InvalidEntity { id: String, reason: String },
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
