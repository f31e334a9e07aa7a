//! Application container shared by the HTTP layer and the workers.

use std::sync::Arc;

use crate::infrastructure::ports::{BatchQueuePort, BatchRepo, ClockPort, GeoCacheRepo, GeoProviderPort};
use crate::use_cases::batch::BatchUseCases;
use crate::use_cases::cache::CacheUseCases;
use crate::use_cases::geo::{GeoUseCases, GetBatchStatus, LookupGeo, SubmitBatch};
use crate::use_cases::{GeoResolver, ProcessBatch, SeedGeoCache, SweepGeoCache};

/// Adapters the application is assembled from.
pub struct AppPorts {
    pub batches: Arc<dyn BatchRepo>,
    pub cache: Arc<dyn GeoCacheRepo>,
    pub provider: Arc<dyn GeoProviderPort>,
    pub clock: Arc<dyn ClockPort>,
    pub queue: Arc<dyn BatchQueuePort>,
}

/// Tunables that shape use-case behaviour.
#[derive(Debug, Clone, Copy)]
pub struct AppSettings {
    pub cache_ttl: chrono::Duration,
    pub max_concurrency: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            cache_ttl: chrono::Duration::hours(12),
            max_concurrency: 8,
        }
    }
}

pub struct UseCases {
    pub geo: GeoUseCases,
    pub batch: BatchUseCases,
    pub cache: CacheUseCases,
}

pub struct App {
    pub use_cases: UseCases,
    pub queue: Arc<dyn BatchQueuePort>,
}

impl App {
    pub fn new(ports: AppPorts, settings: AppSettings) -> Self {
        let AppPorts {
            batches,
            cache,
            provider,
            clock,
            queue,
        } = ports;

        let resolver = Arc::new(GeoResolver::new(
            cache.clone(),
            provider,
            clock.clone(),
            settings.cache_ttl,
        ));

        let geo = GeoUseCases::new(
            Arc::new(LookupGeo::new(resolver.clone())),
            Arc::new(SubmitBatch::new(batches.clone(), queue.clone(), clock.clone())),
            Arc::new(GetBatchStatus::new(batches.clone(), clock.clone())),
        );
        let batch = BatchUseCases::new(Arc::new(ProcessBatch::new(
            batches,
            resolver,
            clock.clone(),
            settings.max_concurrency,
        )));
        let cache = CacheUseCases::new(
            Arc::new(SweepGeoCache::new(cache.clone(), clock.clone(), settings.cache_ttl)),
            Arc::new(SeedGeoCache::new(cache, clock)),
        );

        Self {
            use_cases: UseCases { geo, batch, cache },
            queue,
        }
    }
}
