//! Geolocation routes: single lookup, batch submission and batch status.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use ipgeo_domain::{BatchId, GeoData};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::use_cases::geo::BatchStatusView;
use crate::App;

pub fn create_geo_routes() -> Router<Arc<App>> {
    Router::new()
        .route("/api/geo/batch", post(submit_batch))
        .route("/api/geo/batch/{id}", get(get_batch_status))
        .route("/api/geo/{ip}", get(lookup_geo))
}

/// Either a bare JSON array of IPs or `{"ips": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BatchRequest {
    List(Vec<String>),
    Wrapped { ips: Vec<String> },
}

impl BatchRequest {
    fn into_ips(self) -> Vec<String> {
        match self {
            Self::List(ips) | Self::Wrapped { ips } => ips,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAcceptedResponse {
    pub batch_id: BatchId,
    pub status_url: String,
}

async fn lookup_geo(
    State(app): State<Arc<App>>,
    Path(ip): Path<String>,
) -> Result<Json<GeoData>, ApiError> {
    let geo = app.use_cases.geo.lookup.execute(&ip).await?;
    Ok(Json(geo))
}

async fn submit_batch(
    State(app): State<Arc<App>>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BatchAcceptedResponse>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?;

    let accepted = app
        .use_cases
        .geo
        .submit_batch
        .execute(request.into_ips())
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchAcceptedResponse {
            batch_id: accepted.batch_id,
            status_url: format!("/api/geo/batch/{}", accepted.batch_id),
        }),
    ))
}

async fn get_batch_status(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<BatchStatusView>, ApiError> {
    // Non-UUID ids cannot name a batch.
    let batch_id: BatchId = id
        .parse()
        .map_err(|_| ApiError::new(StatusCode::NOT_FOUND, "Batch not found."))?;

    let view = app
        .use_cases
        .geo
        .batch_status
        .execute(batch_id)
        .await?;
    Ok(Json(view))
}
