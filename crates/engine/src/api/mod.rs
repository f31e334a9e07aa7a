//! HTTP API.

mod error;
mod geo_routes;

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::json;

use crate::App;

pub use error::ApiError;

/// Create all API routes
pub fn create_routes() -> Router<Arc<App>> {
    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/health/queue", get(queue_health_check))
        .merge(geo_routes::create_geo_routes())
}

/// Number of batches admitted but not yet picked up by the worker.
async fn queue_health_check(
    axum::extract::State(app): axum::extract::State<Arc<App>>,
) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "batchQueue": { "pending": app.queue.depth() },
    }))
}
