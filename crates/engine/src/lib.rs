//! IP geolocation engine: cached single lookups and queued batch resolution
//! behind a small HTTP API.

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod use_cases;

pub use app::{App, AppPorts, AppSettings};
