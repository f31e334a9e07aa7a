//! Dependency wiring for the engine binary.

use std::sync::Arc;

use anyhow::{Context, Result};

use ipgeo_engine::infrastructure::clock::SystemClock;
use ipgeo_engine::infrastructure::config::{AppConfig, StoreBackend};
use ipgeo_engine::infrastructure::geo_provider::HttpGeoProvider;
use ipgeo_engine::infrastructure::persistence::{
    connect_sqlite, InMemoryBatchRepo, InMemoryGeoCacheRepo, SqliteBatchRepo, SqliteGeoCacheRepo,
};
use ipgeo_engine::infrastructure::ports::{BatchRepo, ClockPort, GeoCacheRepo, GeoProviderPort};
use ipgeo_engine::infrastructure::queue::{BatchQueue, BatchQueueReceiver};
use ipgeo_engine::infrastructure::resilient_geo::ResilientGeoProvider;
use ipgeo_engine::{App, AppPorts, AppSettings};

/// Build the application and hand back the consumer half of the batch queue.
pub async fn new_app(config: &AppConfig) -> Result<(App, BatchQueueReceiver)> {
    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock);

    let (batches, cache): (Arc<dyn BatchRepo>, Arc<dyn GeoCacheRepo>) = match config.store.backend
    {
        StoreBackend::Sqlite => {
            let pool = connect_sqlite(&config.store.sqlite_path)
                .await
                .with_context(|| format!("opening sqlite database at {}", config.store.sqlite_path))?;
            let batches = SqliteBatchRepo::new(pool.clone())
                .await
                .context("initializing batch tables")?;
            let cache = SqliteGeoCacheRepo::new(pool, clock.clone())
                .await
                .context("initializing geo cache table")?;
            tracing::info!(path = %config.store.sqlite_path, "Using sqlite store");
            let batches: Arc<dyn BatchRepo> = Arc::new(batches);
            let cache: Arc<dyn GeoCacheRepo> = Arc::new(cache);
            (batches, cache)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; batches and cache are lost on restart");
            let batches: Arc<dyn BatchRepo> = Arc::new(InMemoryBatchRepo::new());
            let cache: Arc<dyn GeoCacheRepo> = Arc::new(InMemoryGeoCacheRepo::new(clock.clone()));
            (batches, cache)
        }
    };

    let http = HttpGeoProvider::with_timeout(
        &config.provider.base_url,
        config.provider.api_key.clone(),
        config.provider.timeout_seconds,
    )
    .context("building geo provider client")?;
    let provider: Arc<dyn GeoProviderPort> = Arc::new(ResilientGeoProvider::new(
        Arc::new(http),
        config.provider.retry.clone(),
    ));

    let (queue, receiver) = BatchQueue::channel();

    let ttl_hours = i64::try_from(config.cache.ttl_hours).context("CACHE_TTL_HOURS is too large")?;
    let app = App::new(
        AppPorts {
            batches,
            cache,
            provider,
            clock,
            queue: Arc::new(queue),
        },
        AppSettings {
            cache_ttl: chrono::Duration::hours(ttl_hours),
            max_concurrency: config.batch.max_concurrency,
        },
    );

    Ok((app, receiver))
}
