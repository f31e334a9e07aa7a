//! Geo cache maintenance.

mod seed;
mod sweep;

use std::sync::Arc;

pub use seed::SeedGeoCache;
pub use sweep::SweepGeoCache;

/// Container for cache use cases.
pub struct CacheUseCases {
    pub sweep: Arc<SweepGeoCache>,
    pub seed: Arc<SeedGeoCache>,
}

impl CacheUseCases {
    pub fn new(sweep: Arc<SweepGeoCache>, seed: Arc<SeedGeoCache>) -> Self {
        Self { sweep, seed }
    }
}
