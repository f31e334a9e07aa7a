//! Failures reported across the port boundary.

/// Storage failures. `operation` names the call site so logs point at the query.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// A write referenced a row that does not exist.
    #[error("{entity} {id} does not exist")]
    Missing { entity: &'static str, id: String },

    #[error("Store failure during {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    /// Stored value could not be mapped back into a domain type.
    #[error("Stored value could not be decoded: {0}")]
    Serialization(String),
}

impl RepoError {
    pub fn missing(entity: &'static str, id: impl ToString) -> Self {
        Self::Missing {
            entity,
            id: id.to_string(),
        }
    }

    pub fn database(operation: &'static str, message: impl ToString) -> Self {
        Self::Database {
            operation,
            message: message.to_string(),
        }
    }

    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization(message.to_string())
    }
}

/// Failures talking to the geolocation provider.
///
/// A permanent "the provider has nothing for this IP" is not an error; the
/// port returns `Ok(None)` for it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeoProviderError {
    /// Network failure, timeout, 408, 429 or 5xx. Worth retrying.
    #[error("Geo provider request failed: {0}")]
    Transient(String),

    /// The provider answered 2xx with a body we could not decode.
    #[error("Geo provider returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Geo provider misconfigured: {0}")]
    Configuration(String),
}

impl GeoProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Batch queue is closed")]
    Closed,
}
