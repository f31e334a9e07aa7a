//! Batch submission: validate, persist, then hand off to the worker queue.

use std::sync::Arc;

use ipgeo_domain::{validate_batch_ips, Batch, BatchId};

use super::GeoError;
use crate::infrastructure::ports::{BatchQueuePort, BatchRepo, ClockPort};

const ENQUEUE_FAILED: &str = "Internal server error while enqueuing batch.";

/// Returned once a batch has been stored and queued.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchAccepted {
    pub batch_id: BatchId,
}

pub struct SubmitBatch {
    batches: Arc<dyn BatchRepo>,
    queue: Arc<dyn BatchQueuePort>,
    clock: Arc<dyn ClockPort>,
}

impl SubmitBatch {
    pub fn new(
        batches: Arc<dyn BatchRepo>,
        queue: Arc<dyn BatchQueuePort>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            batches,
            queue,
            clock,
        }
    }

    /// Returns as soon as the batch is queued; processing happens later.
    pub async fn execute(&self, ips: Vec<String>) -> Result<BatchAccepted, GeoError> {
        let ips = validate_batch_ips(&ips)?;
        let batch = Batch::new(&ips, self.clock.now());

        self.batches.create_batch(&batch).await.map_err(|e| {
            tracing::error!(batch_id = %batch.id, error = %e, "Failed to store batch");
            GeoError::unexpected(ENQUEUE_FAILED)
        })?;

        self.queue.submit(batch.id, ips).map_err(|e| {
            tracing::error!(batch_id = %batch.id, error = %e, "Failed to queue batch");
            GeoError::unexpected(ENQUEUE_FAILED)
        })?;

        tracing::info!(
            batch_id = %batch.id,
            total = batch.total_count,
            "Batch accepted"
        );

        Ok(BatchAccepted { batch_id: batch.id })
    }
}
