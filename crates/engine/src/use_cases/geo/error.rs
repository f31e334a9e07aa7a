//! Caller-facing error taxonomy.

use ipgeo_domain::DomainError;

use crate::infrastructure::ports::{GeoProviderError, QueueError, RepoError};

/// Coarse error category, used by the HTTP layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unexpected,
}

/// Errors returned by the geolocation use cases.
///
/// Messages are user-facing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoError {
    /// Malformed input. The caller should fix the request, not retry it.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Provider or store failure.
    #[error("{0}")]
    Unexpected(String),
}

impl GeoError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}

impl From<DomainError> for GeoError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation(msg) => Self::Validation(msg),
            other => Self::Unexpected(other.to_string()),
        }
    }
}

impl From<RepoError> for GeoError {
    fn from(e: RepoError) -> Self {
        Self::Unexpected(e.to_string())
    }
}

impl From<GeoProviderError> for GeoError {
    fn from(e: GeoProviderError) -> Self {
        Self::Unexpected(e.to_string())
    }
}

impl From<QueueError> for GeoError {
    fn from(e: QueueError) -> Self {
        Self::Unexpected(e.to_string())
    }
}
