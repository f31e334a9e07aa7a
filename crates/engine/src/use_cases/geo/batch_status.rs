//! Batch status polling. A pure read against the store; never touches the worker.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ipgeo_domain::{BatchId, BatchStatus};
use serde::Serialize;

use super::GeoError;
use crate::infrastructure::ports::{BatchRepo, ClockPort};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatusView {
    pub batch_id: BatchId,
    pub status: BatchStatus,
    pub processed: u32,
    pub total: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_completion: Option<DateTime<Utc>>,
}

pub struct GetBatchStatus {
    batches: Arc<dyn BatchRepo>,
    clock: Arc<dyn ClockPort>,
}

impl GetBatchStatus {
    pub fn new(batches: Arc<dyn BatchRepo>, clock: Arc<dyn ClockPort>) -> Self {
        Self { batches, clock }
    }

    pub async fn execute(&self, batch_id: BatchId) -> Result<BatchStatusView, GeoError> {
        if batch_id.is_nil() {
            return Err(GeoError::validation("Batch id is required."));
        }

        let batch = self
            .batches
            .get_batch(batch_id)
            .await?
            .ok_or_else(|| GeoError::not_found("Batch not found."))?;

        Ok(BatchStatusView {
            batch_id: batch.id,
            status: batch.status,
            processed: batch.processed_count,
            total: batch.total_count,
            started_at: batch.started_at,
            completed_at: batch.completed_at,
            estimated_completion: batch.estimate_completion(self.clock.now()),
        })
    }
}
