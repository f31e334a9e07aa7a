//! Geolocation use cases: single lookups, batch submission and batch status.

mod batch_status;
mod error;
mod lookup;
mod resolve;
mod submit_batch;

use std::sync::Arc;

pub use batch_status::{BatchStatusView, GetBatchStatus};
pub use error::{ErrorKind, GeoError};
pub use lookup::LookupGeo;
pub use resolve::GeoResolver;
pub use submit_batch::{BatchAccepted, SubmitBatch};

/// Container for geolocation use cases.
pub struct GeoUseCases {
    pub lookup: Arc<LookupGeo>,
    pub submit_batch: Arc<SubmitBatch>,
    pub batch_status: Arc<GetBatchStatus>,
}

impl GeoUseCases {
    pub fn new(
        lookup: Arc<LookupGeo>,
        submit_batch: Arc<SubmitBatch>,
        batch_status: Arc<GetBatchStatus>,
    ) -> Self {
        Self {
            lookup,
            submit_batch,
            batch_status,
        }
    }
}
