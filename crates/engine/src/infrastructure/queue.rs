//! In-process batch admission queue.
//!
//! An unbounded FIFO channel carrying whole-batch work units. Producers never
//! block; a single worker drains it in submission order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ipgeo_domain::{normalize_ips, BatchId};
use tokio::sync::mpsc;

use crate::infrastructure::ports::{BatchQueuePort, QueueError};

/// One queued batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchWorkItem {
    pub batch_id: BatchId,
    pub ips: Vec<String>,
}

/// Producer half, shared by request handlers.
#[derive(Clone)]
pub struct BatchQueue {
    sender: mpsc::UnboundedSender<BatchWorkItem>,
    depth: Arc<AtomicUsize>,
}

/// Consumer half, owned by the batch worker.
pub struct BatchQueueReceiver {
    receiver: mpsc::UnboundedReceiver<BatchWorkItem>,
    depth: Arc<AtomicUsize>,
}

impl BatchQueue {
    pub fn channel() -> (Self, BatchQueueReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        (
            Self {
                sender,
                depth: Arc::clone(&depth),
            },
            BatchQueueReceiver { receiver, depth },
        )
    }
}

impl BatchQueuePort for BatchQueue {
    fn submit(&self, batch_id: BatchId, ips: Vec<String>) -> Result<bool, QueueError> {
        let ips = normalize_ips(ips);
        if ips.is_empty() {
            tracing::info!(batch_id = %batch_id, "Batch has no IPs after normalization, nothing queued");
            return Ok(false);
        }

        let count = ips.len();
        // Count before sending so the receiver can never decrement first.
        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(BatchWorkItem { batch_id, ips }).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            tracing::error!(batch_id = %batch_id, "Batch queue is closed, batch not queued");
            return Err(QueueError::Closed);
        }

        tracing::debug!(batch_id = %batch_id, ip_count = count, "Batch queued");
        Ok(true)
    }

    fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

impl BatchQueueReceiver {
    /// Wait for the next batch. `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<BatchWorkItem> {
        let item = self.receiver.recv().await;
        if item.is_some() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
        item
    }
}
