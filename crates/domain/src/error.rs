//! Domain failures.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Caller supplied malformed input. The message is user-facing.
    #[error("{0}")]
    Validation(String),

    /// A stored status string no longer matches any known value.
    #[error("Unrecognized value: {0}")]
    Parse(String),

    /// A batch or item was asked to move between incompatible states.
    #[error("Illegal status change: {0}")]
    InvalidStateTransition(String),
}

impl DomainError {
    /// Creates a validation error carrying a user-facing message.
    ///
    /// # Example
    /// ```ignore
    /// if ip.trim().is_empty() {
    ///     return Err(DomainError::validation("IP address is required."));
    /// }
    /// ```
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidStateTransition(msg.into())
    }
}
