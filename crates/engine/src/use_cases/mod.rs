//! Use cases: user stories orchestrated over the infrastructure ports.

pub mod batch;
pub mod cache;
pub mod geo;

pub use batch::{BatchError, BatchUseCases, ProcessBatch};
pub use cache::{CacheUseCases, SeedGeoCache, SweepGeoCache};
pub use geo::{GeoError, GeoResolver, GeoUseCases};
