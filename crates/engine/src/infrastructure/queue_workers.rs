//! Background workers for the batch queue and the geo cache.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::infrastructure::queue::BatchQueueReceiver;
use crate::use_cases::{ProcessBatch, SweepGeoCache};

/// Single consumer of the batch queue. Batches run one at a time in
/// submission order; parallelism lives inside `ProcessBatch`.
pub async fn batch_worker(
    mut receiver: BatchQueueReceiver,
    process: Arc<ProcessBatch>,
    cancel_token: CancellationToken,
) {
    tracing::info!("Starting batch worker");
    loop {
        let work = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                tracing::info!("Batch worker shutting down");
                break;
            }
            work = receiver.recv() => work,
        };

        let Some(work) = work else {
            tracing::info!("Batch queue closed, batch worker exiting");
            break;
        };

        let batch_id = work.batch_id;
        if let Err(e) = process.execute(batch_id, work.ips, &cancel_token).await {
            tracing::error!(batch_id = %batch_id, error = %e, "Batch processing failed");
        }
    }
}

/// Sweep expired cache entries now and then every `interval` until cancelled.
pub async fn cache_cleanup_worker(
    sweep: Arc<SweepGeoCache>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Starting geo cache cleanup worker");
    loop {
        if cancel_token.is_cancelled() {
            tracing::info!("Cache cleanup worker shutting down");
            break;
        }

        if let Err(e) = sweep.execute().await {
            tracing::error!(error = %e, "Geo cache sweep failed");
        }

        tokio::select! {
            _ = cancel_token.cancelled() => {
                tracing::info!("Cache cleanup worker shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
