//! # DomainError
//!
//! Centralized error handling for the reply subsystem.
//! Maps domain-specific and storage failures to actionable error types.

use thiserror::Error;

/// The primary error type for all domain and port operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Resource not found (e.g., Board, User, Reply, parent Reply)
    #[error("{resource} not found with ID {id}")]
    NotFound { resource: &'static str, id: String },

    /// Request is well-formed but violates a tree rule (board mismatch, depth)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Content blank or over length, dangling references
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Transient write conflict reported by the storage engine
    #[error("write conflict: {0}")]
    Conflict(String),

    /// Storage temporarily unreachable (pool exhausted, I/O)
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Infrastructure failure or broken internal invariant
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Whether repeating the same statement may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Unavailable(_))
    }
}

/// A specialized Result type for domain logic.
pub type DomainResult<T> = std::result::Result<T, DomainError>;
