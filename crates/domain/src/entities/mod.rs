mod batch;
mod batch_item;
mod geo_cache;

pub use batch::{Batch, BatchStatus};
pub use batch_item::{BatchItem, BatchItemStatus};
pub use geo_cache::GeoCacheEntry;
