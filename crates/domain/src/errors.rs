//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Error)]
pub enum DomainError {
    /// Backend name outside the closed set of supported backends
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// Model category name not recognized
    #[error("Unknown model category: {0}")]
    UnknownCategory(String),

    /// Chat role name not recognized
    #[error("Unknown message role: {0}")]
    UnknownRole(String),

    /// Validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),
}
