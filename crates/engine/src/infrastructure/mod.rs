//! Infrastructure: port traits and their adapters.

pub mod clock;
pub mod config;
pub mod geo_provider;
pub mod persistence;
pub mod ports;
pub mod queue;
pub mod queue_workers;
pub mod resilient_geo;
