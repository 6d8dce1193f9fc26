//! HTTP request handlers.

pub mod floats;
pub mod health;
pub mod query;
pub mod status;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use argo_common::ArgoError;

/// Map a domain error to a JSON error body with its HTTP status.
pub(crate) fn error_response(error: &ArgoError) -> Response {
    let status = StatusCode::from_u16(error.http_status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(serde_json::json!({ "error": error.to_string() })),
    )
        .into_response()
}
