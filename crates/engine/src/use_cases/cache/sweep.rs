use std::sync::Arc;

use chrono::Duration;

use crate::infrastructure::ports::{ClockPort, GeoCacheRepo, RepoError};

/// Remove cache entries older than the TTL.
pub struct SweepGeoCache {
    cache: Arc<dyn GeoCacheRepo>,
    clock: Arc<dyn ClockPort>,
    ttl: Duration,
}

impl SweepGeoCache {
    pub fn new(cache: Arc<dyn GeoCacheRepo>, clock: Arc<dyn ClockPort>, ttl: Duration) -> Self {
        Self { cache, clock, ttl }
    }

    /// Returns the number of entries removed.
    pub async fn execute(&self) -> Result<u64, RepoError> {
        let cutoff = self.clock.now() - self.ttl;
        let removed = self.cache.sweep_older_than(cutoff).await?;
        tracing::info!(removed, cutoff = %cutoff, "Swept expired geo cache entries");
        Ok(removed)
    }
}
