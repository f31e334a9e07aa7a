//! Seams between the use cases and the outside world.
//!
//! Storage, the geolocation provider, the batch queue and the clock are
//! traits so tests can swap in mocks or in-memory doubles.

mod clock;
mod error;
mod external;
mod repos;

pub use clock::ClockPort;
pub use error::{GeoProviderError, QueueError, RepoError};
pub use external::{BatchQueuePort, GeoProviderPort};
pub use repos::{BatchRepo, GeoCacheRepo};

#[cfg(test)]
pub use external::{MockBatchQueuePort, MockGeoProviderPort};
#[cfg(test)]
pub use repos::{MockBatchRepo, MockGeoCacheRepo};
