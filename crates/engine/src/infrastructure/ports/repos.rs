//! Repository port traits for storage access.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ipgeo_domain::{Batch, BatchId, BatchItem, GeoCacheEntry};

use super::error::RepoError;

// =============================================================================
// Batch Storage
// =============================================================================

/// Durable record of batches and their items.
///
/// Writes are whole-entity upserts; callers always write back the full
/// mutated value.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BatchRepo: Send + Sync {
    /// Persist the batch row and every item row together, or nothing.
    async fn create_batch(&self, batch: &Batch) -> Result<(), RepoError>;
    /// Load a batch with all of its items.
    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, RepoError>;
    async fn update_item(&self, item: &BatchItem) -> Result<(), RepoError>;
    /// Write batch-level fields. Items are not touched.
    async fn update_batch(&self, batch: &Batch) -> Result<(), RepoError>;
}

// =============================================================================
// Geo Cache Storage
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeoCacheRepo: Send + Sync {
    async fn get(&self, ip: &str) -> Result<Option<GeoCacheEntry>, RepoError>;
    /// Like `get`, but a stale entry reads as a miss.
    async fn get_valid(&self, ip: &str, ttl: Duration) -> Result<Option<GeoCacheEntry>, RepoError>;
    /// Insert or fully replace the entry for `entry.ip`.
    async fn put(&self, entry: &GeoCacheEntry) -> Result<(), RepoError>;
    /// Delete entries fetched before `cutoff`. Returns how many were removed.
    async fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepoError>;
    async fn count(&self) -> Result<u64, RepoError>;
}
