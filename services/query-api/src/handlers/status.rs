//! Service status and dataset metadata handlers.

use std::sync::Arc;

use axum::{
    extract::Extension,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use argo_common::REGIONS;

use crate::state::AppState;

use super::error_response;

/// GET /api/status - service and database connectivity
pub async fn status_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let database = match state.store.ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {}", e),
    };
    let healthy = database == "ok";

    let data_range = if healthy {
        state
            .store
            .data_extent()
            .await
            .ok()
            .flatten()
            .map(|(start, end)| json!({ "start": start, "end": end }))
    } else {
        None
    };

    Json(json!({
        "service": "query-api",
        "status": if healthy { "ok" } else { "degraded" },
        "database": database,
        "data_range": data_range,
    }))
}

/// GET /api/locations - supported region names with center points
pub async fn locations_handler() -> Json<serde_json::Value> {
    let locations: Vec<_> = REGIONS
        .iter()
        .map(|region| {
            json!({
                "name": region.name,
                "latitude": region.center.0,
                "longitude": region.center.1,
            })
        })
        .collect();

    Json(json!({ "locations": locations }))
}

/// GET /api/available_periods - distinct year/month pairs in the data
pub async fn available_periods_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    match state.store.available_periods().await {
        Ok(periods) => Json(json!({ "periods": periods })).into_response(),
        Err(e) => error_response(&e),
    }
}
