//! Inference errors

use domain::{BackendKind, DomainError};
use thiserror::Error;

/// Errors that can occur while dispatching an inference call
///
/// Every error is a synchronous failure of the call that produced it. Nothing
/// here is retried by the dispatcher.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Backend name outside the supported set
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// Backend exists but does not offer the operation
    #[error("Backend {backend} does not support {operation}")]
    UnsupportedOperation {
        /// Backend that rejected the call
        backend: BackendKind,
        /// Operation that was requested
        operation: &'static str,
    },

    /// Model id absent from the catalog, or without a usable endpoint
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Required request field missing
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// Numeric parameter outside its declared range
    #[error("Parameter '{field}' value {value} is out of range ({bound})")]
    ParameterOutOfRange {
        /// Offending field
        field: String,
        /// Value supplied by the caller
        value: String,
        /// Violated bound, e.g. "max 4"
        bound: String,
    },

    /// Parameter value outside its declared enumeration
    #[error("Parameter '{field}' value {value} is not allowed (allowed: {})", .allowed.join(", "))]
    ParameterNotAllowed {
        /// Offending field
        field: String,
        /// Value supplied by the caller
        value: String,
        /// Allowed values
        allowed: Vec<String>,
    },

    /// Remote call returned an error envelope
    #[error("{backend} provider error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Provider {
        /// Backend that produced the error
        backend: BackendKind,
        /// HTTP status or process exit code, when known
        status: Option<u16>,
        /// Provider message
        message: String,
    },

    /// Success response without the expected fields
    #[error("Malformed {backend} response: {detail}")]
    MalformedResponse {
        /// Backend that produced the response
        backend: BackendKind,
        /// What was missing or malformed
        detail: String,
    },

    /// Call not permitted in the current context
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// OAuth refresh rejected by the provider
    #[error("Credential refresh failed: {0}")]
    CredentialRefreshFailed(String),

    /// Credential store could not load or persist a credential
    #[error("Credential store error: {0}")]
    CredentialStore(String),

    /// Failed to connect to the backend
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request could not be sent
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Call exceeded its deadline
    #[error("Inference timeout after {0}ms")]
    Timeout(u64),

    /// Call cancelled by the caller
    #[error("Inference cancelled")]
    Cancelled,

    /// Invalid backend configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Model catalog could not be loaded
    #[error("Model catalog error: {0}")]
    Catalog(String),
}

impl InferenceError {
    /// Error envelope returned by a provider
    pub fn provider(backend: BackendKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Provider {
            backend,
            status,
            message: message.into(),
        }
    }

    /// Response missing an expected field
    pub fn malformed(backend: BackendKind, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            backend,
            detail: detail.into(),
        }
    }

    /// Operation not offered by a backend
    pub const fn unsupported(backend: BackendKind, operation: &'static str) -> Self {
        Self::UnsupportedOperation { backend, operation }
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(0)
        } else if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else {
            Self::RequestFailed(err.to_string())
        }
    }
}

impl From<DomainError> for InferenceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::UnknownBackend(name) => Self::UnsupportedBackend(name),
            other => Self::Configuration(other.to_string()),
        }
    }
}
