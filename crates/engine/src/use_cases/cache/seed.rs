use std::sync::Arc;

use ipgeo_domain::{GeoCacheEntry, GeoData};

use crate::infrastructure::ports::{ClockPort, GeoCacheRepo, RepoError};

/// Put a single well-known entry into an empty cache so a fresh install
/// answers one lookup without reaching the provider.
pub struct SeedGeoCache {
    cache: Arc<dyn GeoCacheRepo>,
    clock: Arc<dyn ClockPort>,
}

impl SeedGeoCache {
    pub fn new(cache: Arc<dyn GeoCacheRepo>, clock: Arc<dyn ClockPort>) -> Self {
        Self { cache, clock }
    }

    /// Returns `true` if the seed entry was written.
    pub async fn execute(&self) -> Result<bool, RepoError> {
        if self.cache.count().await? > 0 {
            return Ok(false);
        }

        let geo = GeoData::new("8.8.8.8")
            .with_country("US", "United States")
            .with_time_zone("America/Los_Angeles")
            .with_coordinates(37.751, -97.822);
        self.cache
            .put(&GeoCacheEntry::from_geo("8.8.8.8", &geo, self.clock.now()))
            .await?;

        tracing::info!(ip = "8.8.8.8", "Seeded empty geo cache");
        Ok(true)
    }
}
