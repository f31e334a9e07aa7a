//! Background batch processing.

mod process_batch;

use std::sync::Arc;

use ipgeo_domain::DomainError;

use crate::infrastructure::ports::RepoError;

pub use process_batch::{ProcessBatch, NO_DATA_MESSAGE};

/// Container for batch use cases.
pub struct BatchUseCases {
    pub process: Arc<ProcessBatch>,
}

impl BatchUseCases {
    pub fn new(process: Arc<ProcessBatch>) -> Self {
        Self { process }
    }
}

/// Failures inside the batch worker. These are logged, never surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}
