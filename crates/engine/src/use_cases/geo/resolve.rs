//! Cache-aside resolution shared by the lookup and batch paths.

use std::sync::Arc;

use chrono::Duration;
use ipgeo_domain::{GeoCacheEntry, GeoData};

use super::GeoError;
use crate::infrastructure::ports::{ClockPort, GeoCacheRepo, GeoProviderPort};

/// Resolve an IP from a fresh cache entry, falling back to the provider.
pub struct GeoResolver {
    cache: Arc<dyn GeoCacheRepo>,
    provider: Arc<dyn GeoProviderPort>,
    clock: Arc<dyn ClockPort>,
    ttl: Duration,
}

impl GeoResolver {
    pub fn new(
        cache: Arc<dyn GeoCacheRepo>,
        provider: Arc<dyn GeoProviderPort>,
        clock: Arc<dyn ClockPort>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            provider,
            clock,
            ttl,
        }
    }

    /// `Ok(None)` when the provider has no data for the IP.
    ///
    /// Provider results are cached under the requested IP, so the next lookup
    /// for the same spelling hits even if the provider echoes a different one.
    pub async fn resolve(&self, ip: &str) -> Result<Option<GeoData>, GeoError> {
        if let Some(entry) = self.cache.get_valid(ip, self.ttl).await? {
            tracing::debug!(ip = %ip, "Geo cache hit");
            return Ok(Some(entry.to_geo()));
        }

        let Some(geo) = self.provider.fetch(ip).await? else {
            return Ok(None);
        };

        let entry = GeoCacheEntry::from_geo(ip, &geo, self.clock.now());
        if let Err(e) = self.cache.put(&entry).await {
            // The lookup itself succeeded; a missed cache write only costs a refetch.
            tracing::warn!(ip = %ip, error = %e, "Failed to cache geo result");
        }
        Ok(Some(geo))
    }
}
