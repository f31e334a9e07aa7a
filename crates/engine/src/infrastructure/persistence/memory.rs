//! In-memory stores for development and testing
//!
//! Nothing is persisted; a restart loses every batch and cache entry.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ipgeo_domain::{Batch, BatchId, BatchItem, GeoCacheEntry};
use std::sync::Arc;

use crate::infrastructure::ports::{BatchRepo, ClockPort, GeoCacheRepo, RepoError};

/// In-memory batch storage
#[derive(Default)]
pub struct InMemoryBatchRepo {
    batches: DashMap<BatchId, Batch>,
}

impl InMemoryBatchRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchRepo for InMemoryBatchRepo {
    async fn create_batch(&self, batch: &Batch) -> Result<(), RepoError> {
        match self.batches.entry(batch.id) {
            Entry::Occupied(_) => Err(RepoError::database(
                "create_batch",
                format!("batch {} already exists", batch.id),
            )),
            Entry::Vacant(slot) => {
                slot.insert(batch.clone());
                Ok(())
            }
        }
    }

    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, RepoError> {
        Ok(self.batches.get(&id).map(|batch| batch.clone()))
    }

    async fn update_item(&self, item: &BatchItem) -> Result<(), RepoError> {
        let mut batch = self
            .batches
            .get_mut(&item.batch_id)
            .ok_or_else(|| RepoError::missing("Batch", item.batch_id))?;

        match batch.items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => batch.items.push(item.clone()),
        }
        Ok(())
    }

    async fn update_batch(&self, batch: &Batch) -> Result<(), RepoError> {
        match self.batches.get_mut(&batch.id) {
            Some(mut stored) => {
                stored.status = batch.status;
                stored.processed_count = batch.processed_count;
                stored.average_ms_per_item = batch.average_ms_per_item;
                stored.started_at = batch.started_at;
                stored.completed_at = batch.completed_at;
            }
            None => {
                self.batches.insert(batch.id, batch.clone());
            }
        }
        Ok(())
    }
}

/// In-memory geo cache
pub struct InMemoryGeoCacheRepo {
    entries: DashMap<String, GeoCacheEntry>,
    clock: Arc<dyn ClockPort>,
}

impl InMemoryGeoCacheRepo {
    pub fn new(clock: Arc<dyn ClockPort>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }
}

#[async_trait]
impl GeoCacheRepo for InMemoryGeoCacheRepo {
    async fn get(&self, ip: &str) -> Result<Option<GeoCacheEntry>, RepoError> {
        Ok(self.entries.get(ip).map(|entry| entry.clone()))
    }

    async fn get_valid(&self, ip: &str, ttl: Duration) -> Result<Option<GeoCacheEntry>, RepoError> {
        let now = self.clock.now();
        Ok(self
            .entries
            .get(ip)
            .filter(|entry| entry.is_valid(now, ttl))
            .map(|entry| entry.clone()))
    }

    async fn put(&self, entry: &GeoCacheEntry) -> Result<(), RepoError> {
        self.entries.insert(entry.ip.clone(), entry.clone());
        Ok(())
    }

    async fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepoError> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.last_fetched_at >= cutoff);
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }

    async fn count(&self) -> Result<u64, RepoError> {
        Ok(self.entries.len() as u64)
    }
}
