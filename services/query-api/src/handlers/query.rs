//! The question endpoint: POST /api/query.
//!
//! Every outcome of translation is a 200 with a structured payload;
//! only a failing database turns into a 5xx. Unsupported questions get
//! guidance, not errors.

use std::sync::Arc;

use axum::{
    extract::Extension,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use nl_query::{translate, Translation, TranslationContext};

use crate::state::AppState;
use crate::summary::summarize;

use super::error_response;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub query_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    pub summary: String,
    pub data: Vec<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_range: Option<DataRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_floats: Option<Vec<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_regions: Option<Vec<&'static str>>,
}

impl QueryResponse {
    /// A payload that carries guidance instead of rows.
    fn message(query_type: &str, summary: String) -> Self {
        Self {
            query_type: query_type.to_string(),
            sql_query: None,
            summary,
            data: Vec::new(),
            data_range: None,
            suggested_floats: None,
            examples: None,
            supported_regions: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DataRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// POST /api/query - translate a question and run it
pub async fn query_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Response {
    counter!("query_requests_total").increment(1);

    let question = request.question.trim();
    if question.is_empty() {
        let mut response = QueryResponse::message(
            "General",
            "Ask me about temperature, salinity, float trajectories, profiles, \
             or nearby floats."
                .to_string(),
        );
        response.examples = Some(nl_query::EXAMPLE_QUESTIONS.to_vec());
        return Json(response).into_response();
    }

    // Anchor relative phrases like "last 6 months" to the data extent
    // so a stale dataset still answers over the span it actually has.
    let extent = match state.store.data_extent().await {
        Ok(extent) => extent,
        Err(e) => {
            counter!("query_failures_total").increment(1);
            return error_response(&e);
        }
    };
    let ctx = TranslationContext::new(Utc::now()).with_max_timestamp(extent.map(|(_, max)| max));

    match translate(question, &ctx) {
        Translation::Query { intent, query } => {
            let category = intent.category.as_str();
            info!(category = category, "Translated question");
            counter!("query_translations_total", "category" => category).increment(1);

            match state.store.run_query(&query).await {
                Ok(rows) => {
                    let summary = summarize(&intent, &rows);
                    Json(QueryResponse {
                        query_type: category.to_string(),
                        sql_query: Some(query.sql),
                        summary,
                        data: rows,
                        data_range: extent.map(|(start, end)| DataRange { start, end }),
                        suggested_floats: None,
                        examples: None,
                        supported_regions: None,
                    })
                    .into_response()
                }
                Err(e) => {
                    warn!(error = %e, "Generated query failed");
                    counter!("query_failures_total").increment(1);
                    error_response(&e)
                }
            }
        }

        Translation::NeedsFloatId { intent } => {
            let candidates = state
                .store
                .distinct_floats(intent.region, intent.window.as_ref(), 20)
                .await
                .unwrap_or_default();
            let ids: Vec<i32> = candidates.iter().map(|f| f.float_id).collect();

            let summary = if ids.is_empty() {
                "Please specify a float ID, for example \"trajectory of float 2902115\"."
                    .to_string()
            } else {
                format!(
                    "Please specify a float ID. Floats matching your filters: {}.",
                    ids.iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            };

            let mut response = QueryResponse::message(intent.category.as_str(), summary);
            response.suggested_floats = Some(ids);
            Json(response).into_response()
        }

        Translation::NeedsLocation { message } => {
            Json(QueryResponse::message("Proximity", message)).into_response()
        }

        Translation::UnknownRegion { name, supported } => {
            let mut response = QueryResponse::message(
                "General",
                format!(
                    "I don't have data for \"{}\". Try one of the supported regions.",
                    name
                ),
            );
            response.supported_regions = Some(supported);
            Json(response).into_response()
        }

        Translation::OutOfRange { message } => {
            Json(QueryResponse::message("General", message)).into_response()
        }

        Translation::Help { message, examples } => {
            counter!("query_unsupported_total").increment(1);
            let mut response = QueryResponse::message("General", message);
            response.examples = Some(examples);
            Json(response).into_response()
        }
    }
}
