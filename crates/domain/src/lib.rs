//! IpGeo domain: batches of IP lookups, their items, and cached geo results.
//!
//! Everything here is synchronous and IO-free. Callers pass the current time
//! in explicitly so state transitions and TTL checks stay deterministic.

pub mod entities;
pub mod error;
pub mod ids;
pub mod value_objects;

pub use entities::{Batch, BatchItem, BatchItemStatus, BatchStatus, GeoCacheEntry};
pub use error::DomainError;
pub use ids::{BatchId, BatchItemId};
pub use value_objects::{normalize_ip, normalize_ips, validate_batch_ips, GeoData};
