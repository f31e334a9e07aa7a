//! Resolve every IP in a queued batch with bounded parallelism.
//!
//! Item tasks never share a mutable batch. Each re-reads its own item from
//! the store, and batch aggregates are recomputed from the stored item set
//! once every task has settled.

use std::sync::Arc;
use std::time::Instant;

use ipgeo_domain::{Batch, BatchId};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::BatchError;
use crate::infrastructure::ports::{BatchRepo, ClockPort};
use crate::use_cases::geo::GeoResolver;

/// Recorded on an item when the provider has nothing for its IP.
pub const NO_DATA_MESSAGE: &str = "Geo provider returned no data.";

pub struct ProcessBatch {
    batches: Arc<dyn BatchRepo>,
    resolver: Arc<GeoResolver>,
    clock: Arc<dyn ClockPort>,
    permits: Arc<Semaphore>,
}

impl ProcessBatch {
    pub fn new(
        batches: Arc<dyn BatchRepo>,
        resolver: Arc<GeoResolver>,
        clock: Arc<dyn ClockPort>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            batches,
            resolver,
            clock,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Process one dequeued batch.
    ///
    /// Returns the batch as persisted after aggregation, or `None` if it no
    /// longer exists. Per-IP failures are recorded on their items and never
    /// fail the batch.
    pub async fn execute(
        &self,
        batch_id: BatchId,
        ips: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<Option<Batch>, BatchError> {
        let Some(mut batch) = self.batches.get_batch(batch_id).await? else {
            tracing::warn!(batch_id = %batch_id, "Queued batch not found, skipping");
            return Ok(None);
        };

        // Persist Running before any item finishes so polling sees progress.
        batch.mark_running(self.clock.now());
        self.batches.update_batch(&batch).await?;

        tracing::info!(
            batch_id = %batch_id,
            ip_count = ips.len(),
            "Processing batch"
        );

        let mut tasks = JoinSet::new();
        for ip in ips {
            let item = ItemTask {
                batches: Arc::clone(&self.batches),
                resolver: Arc::clone(&self.resolver),
                clock: Arc::clone(&self.clock),
                batch_id,
                ip,
            };
            let permits = Arc::clone(&self.permits);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    permit = permits.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                };

                if let Err(e) = item.run(&cancel).await {
                    tracing::error!(
                        batch_id = %item.batch_id,
                        ip = %item.ip,
                        error = %e,
                        "Error processing IP"
                    );
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(batch_id = %batch_id, error = %e, "IP task panicked");
            }
        }

        // Ground truth: whatever the item tasks managed to persist.
        let Some(mut batch) = self.batches.get_batch(batch_id).await? else {
            tracing::warn!(batch_id = %batch_id, "Batch vanished during processing");
            return Ok(None);
        };
        batch.recompute_progress(self.clock.now());
        self.batches.update_batch(&batch).await?;

        if cancel.is_cancelled() {
            tracing::info!(
                batch_id = %batch_id,
                processed = batch.processed_count,
                total = batch.total_count,
                "Batch interrupted by shutdown"
            );
        } else {
            tracing::info!(
                batch_id = %batch_id,
                processed = batch.processed_count,
                total = batch.total_count,
                status = %batch.status,
                average_ms = ?batch.average_ms_per_item,
                "Batch processed"
            );
        }

        Ok(Some(batch))
    }
}

/// Resolution of a single IP, run on its own task.
struct ItemTask {
    batches: Arc<dyn BatchRepo>,
    resolver: Arc<GeoResolver>,
    clock: Arc<dyn ClockPort>,
    batch_id: BatchId,
    ip: String,
}

impl ItemTask {
    async fn run(&self, cancel: &CancellationToken) -> Result<(), BatchError> {
        let Some(batch) = self.batches.get_batch(self.batch_id).await? else {
            tracing::warn!(batch_id = %self.batch_id, ip = %self.ip, "Batch not found while processing IP");
            return Ok(());
        };
        let Some(mut item) = batch.pending_item(&self.ip).cloned() else {
            tracing::warn!(
                batch_id = %self.batch_id,
                ip = %self.ip,
                "Batch item not found or already processed"
            );
            return Ok(());
        };

        item.mark_running(self.clock.now())?;
        let started = Instant::now();

        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // Nothing persisted yet, so the stored item stays Pending.
                tracing::debug!(batch_id = %self.batch_id, ip = %self.ip, "IP abandoned on shutdown");
                return Ok(());
            }
            resolved = self.resolver.resolve(&self.ip) => resolved,
        };

        let now = self.clock.now();
        match resolved {
            Ok(Some(geo)) => item.mark_succeeded(&geo, now)?,
            Ok(None) => item.mark_failed(NO_DATA_MESSAGE, now)?,
            Err(e) => {
                tracing::error!(
                    batch_id = %self.batch_id,
                    ip = %self.ip,
                    error = %e,
                    "Geo resolution failed"
                );
                item.mark_failed(e.to_string(), now)?;
            }
        }
        item.record_duration(i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX));

        self.batches.update_item(&item).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::persistence::{InMemoryBatchRepo, InMemoryGeoCacheRepo};
    use crate::infrastructure::ports::{
        GeoCacheRepo, GeoProviderError, GeoProviderPort, MockGeoProviderPort,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use ipgeo_domain::{BatchItemStatus, BatchStatus, GeoCacheEntry, GeoData};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn ips(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    struct Harness {
        batches: Arc<InMemoryBatchRepo>,
        cache: Arc<InMemoryGeoCacheRepo>,
        process: ProcessBatch,
    }

    fn harness(provider: Arc<dyn GeoProviderPort>, max_concurrency: usize) -> Harness {
        let clock = Arc::new(FixedClock(now()));
        let batches = Arc::new(InMemoryBatchRepo::new());
        let cache = Arc::new(InMemoryGeoCacheRepo::new(clock.clone()));
        let resolver = Arc::new(GeoResolver::new(
            cache.clone(),
            provider,
            clock.clone(),
            Duration::hours(12),
        ));
        let process = ProcessBatch::new(batches.clone(), resolver, clock, max_concurrency);
        Harness {
            batches,
            cache,
            process,
        }
    }

    async fn stored_batch(h: &Harness, ip_list: &[&str]) -> Batch {
        let batch = Batch::new(&ips(ip_list), now());
        h.batches.create_batch(&batch).await.unwrap();
        batch
    }

    /// Provider that answers after a short delay and tracks peak concurrency.
    struct SlowProvider {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        delay_ms: u64,
    }

    impl SlowProvider {
        fn new(delay_ms: u64) -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                delay_ms,
            }
        }
    }

    #[async_trait]
    impl GeoProviderPort for SlowProvider {
        async fn fetch(&self, ip: &str) -> Result<Option<GeoData>, GeoProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Some(GeoData::new(ip).with_country("US", "United States")))
        }
    }

    #[tokio::test]
    async fn all_items_resolve_and_batch_completes() {
        let provider = Arc::new(SlowProvider::new(5));
        let h = harness(provider.clone(), 8);
        let batch = stored_batch(&h, &["1.1.1.1", "8.8.8.8", "9.9.9.9"]).await;

        let done = h
            .process
            .execute(batch.id, ips(&["1.1.1.1", "8.8.8.8", "9.9.9.9"]), &CancellationToken::new())
            .await
            .unwrap()
            .expect("batch");

        assert_eq!(done.status, BatchStatus::Completed);
        assert_eq!(done.processed_count, 3);
        assert_eq!(done.processed_count, done.total_count);
        assert_eq!(done.started_at, Some(now()));
        assert_eq!(done.completed_at, Some(now()));
        assert!(done
            .items
            .iter()
            .all(|i| i.status == BatchItemStatus::Succeeded && i.attempts == 1));
        assert_eq!(h.cache.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn average_is_the_mean_of_stored_item_durations() {
        let provider = Arc::new(SlowProvider::new(20));
        let h = harness(provider, 8);
        let batch = stored_batch(&h, &["1.1.1.1", "8.8.8.8", "9.9.9.9"]).await;

        let done = h
            .process
            .execute(batch.id, ips(&["1.1.1.1", "8.8.8.8", "9.9.9.9"]), &CancellationToken::new())
            .await
            .unwrap()
            .expect("batch");

        let durations: Vec<i64> = done.items.iter().filter_map(|i| i.duration_ms).collect();
        assert_eq!(durations.len(), 3);
        let mean = durations.iter().sum::<i64>() as f64 / 3.0;
        assert_eq!(done.average_ms_per_item, Some(mean));
    }

    #[tokio::test]
    async fn no_data_fails_the_item_but_the_batch_still_completes() {
        let mut provider = MockGeoProviderPort::new();
        provider.expect_fetch().returning(|ip| {
            if ip == "9.9.9.9" {
                Ok(None)
            } else {
                Ok(Some(GeoData::new(ip)))
            }
        });
        let h = harness(Arc::new(provider), 8);
        let batch = stored_batch(&h, &["8.8.8.8", "9.9.9.9"]).await;

        let done = h
            .process
            .execute(batch.id, ips(&["8.8.8.8", "9.9.9.9"]), &CancellationToken::new())
            .await
            .unwrap()
            .expect("batch");

        let failed = done.items.iter().find(|i| i.ip == "9.9.9.9").unwrap();
        assert_eq!(failed.status, BatchItemStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some(NO_DATA_MESSAGE));
        assert!(failed.completed_at.is_some());
        assert_eq!(done.status, BatchStatus::Completed);
        assert_eq!(done.processed_count, 2);
    }

    #[tokio::test]
    async fn provider_errors_are_contained_to_their_item() {
        let mut provider = MockGeoProviderPort::new();
        provider.expect_fetch().returning(|ip| {
            if ip == "1.1.1.1" {
                Err(GeoProviderError::InvalidResponse("not json".into()))
            } else {
                Ok(Some(GeoData::new(ip)))
            }
        });
        let h = harness(Arc::new(provider), 8);
        let batch = stored_batch(&h, &["1.1.1.1", "8.8.8.8"]).await;

        let done = h
            .process
            .execute(batch.id, ips(&["1.1.1.1", "8.8.8.8"]), &CancellationToken::new())
            .await
            .unwrap()
            .expect("batch");

        let broken = done.items.iter().find(|i| i.ip == "1.1.1.1").unwrap();
        assert_eq!(broken.status, BatchItemStatus::Failed);
        assert!(broken
            .error_message
            .as_deref()
            .unwrap()
            .contains("invalid response"));
        let fine = done.items.iter().find(|i| i.ip == "8.8.8.8").unwrap();
        assert_eq!(fine.status, BatchItemStatus::Succeeded);
        assert!(done.is_completed());
    }

    #[tokio::test]
    async fn cached_ips_skip_the_provider() {
        let mut provider = MockGeoProviderPort::new();
        provider
            .expect_fetch()
            .times(1)
            .returning(|ip| Ok(Some(GeoData::new(ip))));
        let h = harness(Arc::new(provider), 8);
        h.cache
            .put(&GeoCacheEntry::from_geo(
                "8.8.8.8",
                &GeoData::new("8.8.8.8").with_country("US", "United States"),
                now() - Duration::hours(1),
            ))
            .await
            .unwrap();
        let batch = stored_batch(&h, &["1.1.1.1", "8.8.8.8"]).await;

        let done = h
            .process
            .execute(batch.id, ips(&["1.1.1.1", "8.8.8.8"]), &CancellationToken::new())
            .await
            .unwrap()
            .expect("batch");

        let cached = done.items.iter().find(|i| i.ip == "8.8.8.8").unwrap();
        assert_eq!(cached.country_code.as_deref(), Some("US"));
        assert!(done.is_completed());
    }

    #[tokio::test]
    async fn parallelism_never_exceeds_the_permit_count() {
        let provider = Arc::new(SlowProvider::new(20));
        let h = harness(provider.clone(), 2);
        let list: Vec<String> = (1..=10).map(|n| format!("10.0.0.{n}")).collect();
        let batch = Batch::new(&list, now());
        h.batches.create_batch(&batch).await.unwrap();

        let done = h
            .process
            .execute(batch.id, list, &CancellationToken::new())
            .await
            .unwrap()
            .expect("batch");

        assert!(done.is_completed());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 10);
        assert!(provider.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn missing_batch_is_skipped() {
        let mut provider = MockGeoProviderPort::new();
        provider.expect_fetch().times(0);
        let h = harness(Arc::new(provider), 8);

        let result = h
            .process
            .execute(BatchId::new(), ips(&["8.8.8.8"]), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn already_processed_items_are_not_resolved_again() {
        let provider = Arc::new(SlowProvider::new(1));
        let h = harness(provider.clone(), 8);
        let batch = stored_batch(&h, &["8.8.8.8"]).await;
        let token = CancellationToken::new();

        h.process
            .execute(batch.id, ips(&["8.8.8.8"]), &token)
            .await
            .unwrap();
        let again = h
            .process
            .execute(batch.id, ips(&["8.8.8.8"]), &token)
            .await
            .unwrap()
            .expect("batch");

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(again.items[0].attempts, 1);
        assert!(again.is_completed());
    }

    #[tokio::test]
    async fn cancelled_batch_leaves_unstarted_items_pending() {
        let provider = Arc::new(SlowProvider::new(1));
        let h = harness(provider.clone(), 8);
        let batch = stored_batch(&h, &["1.1.1.1", "8.8.8.8"]).await;
        let token = CancellationToken::new();
        token.cancel();

        let after = h
            .process
            .execute(batch.id, ips(&["1.1.1.1", "8.8.8.8"]), &token)
            .await
            .unwrap()
            .expect("batch");

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(after.status, BatchStatus::Running);
        assert_eq!(after.processed_count, 0);
        assert!(after.items.iter().all(|i| i.status == BatchItemStatus::Pending));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_item_writes_on_sqlite_lose_no_updates() {
        use crate::infrastructure::persistence::{
            connect_sqlite, SqliteBatchRepo, SqliteGeoCacheRepo,
        };

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ipgeo.db");
        let pool = connect_sqlite(&path.to_string_lossy())
            .await
            .expect("connect");
        let clock = Arc::new(FixedClock(now()));
        let batches = Arc::new(SqliteBatchRepo::new(pool.clone()).await.expect("batch repo"));
        let cache = Arc::new(
            SqliteGeoCacheRepo::new(pool, clock.clone())
                .await
                .expect("cache repo"),
        );
        let provider = Arc::new(SlowProvider::new(2));
        let resolver = Arc::new(GeoResolver::new(
            cache.clone(),
            provider.clone(),
            clock.clone(),
            Duration::hours(12),
        ));
        let process = ProcessBatch::new(batches.clone(), resolver, clock, 8);

        let list: Vec<String> = (1..=100).map(|n| format!("10.0.{}.{}", n / 50, n % 50)).collect();
        let batch = Batch::new(&list, now());
        batches.create_batch(&batch).await.expect("create");

        process
            .execute(batch.id, list, &CancellationToken::new())
            .await
            .expect("execute")
            .expect("batch");

        let stored = batches.get_batch(batch.id).await.expect("get").expect("stored");
        assert_eq!(stored.status, BatchStatus::Completed);
        assert_eq!(stored.total_count, 100);
        assert_eq!(stored.processed_count, stored.total_count);
        assert!(stored
            .items
            .iter()
            .all(|i| i.status == BatchItemStatus::Succeeded && i.attempts == 1));

        let durations: Vec<i64> = stored
            .items
            .iter()
            .filter_map(|i| i.duration_ms)
            .filter(|ms| *ms > 0)
            .collect();
        assert_eq!(durations.len(), 100);
        let mean = durations.iter().sum::<i64>() as f64 / durations.len() as f64;
        assert_eq!(stored.average_ms_per_item, Some(mean));

        assert_eq!(provider.calls.load(Ordering::SeqCst), 100);
        assert!(provider.peak.load(Ordering::SeqCst) <= 8);
        assert_eq!(cache.count().await.expect("count"), 100);
    }
}
