//! HTTP status API for the fetcher.
//!
//! Read-only view over the state database: current phase, checkpoint,
//! aggregate stats and the recent cycle log.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::pipeline::FetchPhase;
use crate::state::{CycleRecord, IngestState};

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub service: String,
    pub dataset: String,
    pub phase: String,
    pub checkpoint: Option<String>,
    pub stats: StatsResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub cycles: u64,
    pub committed: u64,
    pub failed: u64,
    pub total_fetched: u64,
    pub total_inserted: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleResponse {
    pub id: String,
    pub window_start: String,
    pub window_end: String,
    pub fetched_rows: u64,
    pub inserted_rows: u64,
    pub unique_floats: u64,
    pub outcome: String,
    pub error_message: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

impl From<CycleRecord> for CycleResponse {
    fn from(r: CycleRecord) -> Self {
        Self {
            id: r.id.to_string(),
            window_start: r.window_start.to_rfc3339(),
            window_end: r.window_end.to_rfc3339(),
            fetched_rows: r.fetched_rows,
            inserted_rows: r.inserted_rows,
            unique_floats: r.unique_floats,
            outcome: r.outcome.as_str().to_string(),
            error_message: r.error_message,
            started_at: r.started_at.to_rfc3339(),
            finished_at: r.finished_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CyclesQuery {
    pub limit: Option<usize>,
}

pub struct ServerState {
    pub ingest_state: Arc<IngestState>,
    pub phase: watch::Receiver<FetchPhase>,
    pub dataset: String,
}

/// Create the status API router.
pub fn create_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/status", get(status_handler))
        .route("/cycles", get(cycles_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(Extension(state))
}

/// GET /status - checkpoint, current phase and aggregate stats
async fn status_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    let checkpoint = match state.ingest_state.checkpoint(&state.dataset).await {
        Ok(cp) => cp.map(|ts| ts.to_rfc3339()),
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let stats = match state.ingest_state.stats().await {
        Ok(s) => StatsResponse {
            cycles: s.cycles,
            committed: s.committed,
            failed: s.failed,
            total_fetched: s.total_fetched,
            total_inserted: s.total_inserted,
        },
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    Json(StatusResponse {
        service: "fetcher".to_string(),
        dataset: state.dataset.clone(),
        phase: state.phase.borrow().as_str().to_string(),
        checkpoint,
        stats,
    })
    .into_response()
}

/// GET /cycles?limit= - recent fetch cycles, newest first
async fn cycles_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Query(params): Query<CyclesQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(20).min(200);

    match state.ingest_state.recent_cycles(limit).await {
        Ok(records) => {
            let cycles: Vec<CycleResponse> =
                records.into_iter().map(CycleResponse::from).collect();
            Json(serde_json::json!({ "cycles": cycles })).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// GET /health - health check endpoint
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "fetcher"
    }))
}

/// Start the HTTP server.
pub async fn run_server(state: Arc<ServerState>, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    info!(port = port, "Starting fetch status server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
