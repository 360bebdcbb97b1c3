//! Domain error model.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Business-rule failure raised by a pure domain operation.
///
/// Every variant carries a stable machine-readable [`code`](DomainError::code)
/// that outer layers put on the wire next to the human message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input rejected before any state was consulted.
    #[error("{0}")]
    Validation(String),

    #[error("invalid id: {0}")]
    InvalidId(String),

    /// Names the missing resource, e.g. `"product"`.
    #[error("{0} not found")]
    NotFound(String),

    /// The current state forbids the change: insufficient stock, a delivery
    /// already taken, a duplicate, a terminal status.
    #[error("{0}")]
    Conflict(String),

    /// Internal consistency broke (a computed value out of range).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The actor may not touch this particular record.
    #[error("not allowed")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvalidId(_) => "invalid_id",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::Unauthorized => "unauthorized",
        }
    }
}
