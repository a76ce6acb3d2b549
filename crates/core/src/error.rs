//! Domain error model.

use thiserror::Error;

use crate::job::JobStatus;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic failures (validation, malformed payloads,
/// illegal state transitions). Backend and storage concerns belong in infra.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. empty store name).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A store subscription is unusable (empty pattern, bad regex).
    #[error("invalid subscription: {0}")]
    InvalidSubscription(String),

    /// A store/source/feature-set payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// An identifier or reference was malformed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The job state machine does not allow this transition.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_subscription(msg: impl Into<String>) -> Self {
        Self::InvalidSubscription(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
