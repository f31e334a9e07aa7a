//! External service ports.

use async_trait::async_trait;
use ipgeo_domain::{BatchId, GeoData};

use super::error::{GeoProviderError, QueueError};

// =============================================================================
// Geolocation Provider
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeoProviderPort: Send + Sync {
    /// Resolve one IP. `Ok(None)` means the provider has no data for it.
    async fn fetch(&self, ip: &str) -> Result<Option<GeoData>, GeoProviderError>;
}

// =============================================================================
// Batch Admission Queue
// =============================================================================

#[cfg_attr(test, mockall::automock)]
pub trait BatchQueuePort: Send + Sync {
    /// Admit a whole batch for background processing without waiting on it.
    ///
    /// Returns `false` when the normalized IP list is empty and nothing was
    /// queued.
    fn submit(&self, batch_id: BatchId, ips: Vec<String>) -> Result<bool, QueueError>;
    /// Batches admitted but not yet picked up by the worker.
    fn depth(&self) -> usize;
}
