//! Per-float and proximity endpoints.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

use argo_common::ArgoError;

use crate::state::AppState;

use super::error_response;

#[derive(Debug, Deserialize)]
pub struct NearestQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub limit: Option<i64>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// Year and month filter both present, or no filter at all.
fn period(year: Option<i32>, month: Option<u32>) -> Option<(i32, u32)> {
    match (year, month) {
        (Some(y), Some(m)) if (1..=12).contains(&m) => Some((y, m)),
        _ => None,
    }
}

/// GET /api/nearest_floats?lat=..&lon=.. - latest float positions by distance
pub async fn nearest_floats_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<NearestQuery>,
) -> Response {
    let lat = match params.lat {
        Some(lat) => lat,
        None => return error_response(&ArgoError::MissingParameter("lat".to_string())),
    };
    let lon = match params.lon {
        Some(lon) => lon,
        None => return error_response(&ArgoError::MissingParameter("lon".to_string())),
    };
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return error_response(&ArgoError::InvalidParameter {
            param: "lat/lon".to_string(),
            message: "coordinates out of range".to_string(),
        });
    }

    let limit = params.limit.unwrap_or(5).clamp(1, 50);

    match state
        .store
        .nearest_floats(lat, lon, limit, period(params.year, params.month))
        .await
    {
        Ok(floats) => Json(json!({
            "query_point": { "latitude": lat, "longitude": lon },
            "floats": floats,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /api/float_profile/:id - latest vertical profile of one float
pub async fn float_profile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(float_id): Path<i32>,
    Query(params): Query<PeriodQuery>,
) -> Response {
    match state
        .store
        .float_profile(float_id, period(params.year, params.month))
        .await
    {
        Ok(levels) if levels.is_empty() => error_response(&ArgoError::FloatNotFound(float_id)),
        Ok(levels) => Json(json!({
            "float_id": float_id,
            "timestamp": levels[0].timestamp,
            "num_levels": levels.len(),
            "levels": levels,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /api/float_trajectory/:id - surfacing positions in time order
pub async fn float_trajectory_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(float_id): Path<i32>,
    Query(params): Query<PeriodQuery>,
) -> Response {
    match state
        .store
        .float_trajectory(float_id, period(params.year, params.month))
        .await
    {
        Ok(points) if points.is_empty() => error_response(&ArgoError::FloatNotFound(float_id)),
        Ok(points) => {
            let start_time = points.first().map(|p| p.timestamp);
            let end_time = points.last().map(|p| p.timestamp);
            Json(json!({
                "float_id": float_id,
                "num_points": points.len(),
                "start_time": start_time,
                "end_time": end_time,
                "path": points,
            }))
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}
