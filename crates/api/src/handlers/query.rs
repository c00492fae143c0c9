//! Query handler

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use finrag_common::{
    errors::{AppError, Result},
    retrieval::DEFAULT_TOP_K,
    ScoredRecord,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::state::AppState;

/// `GET /query` parameters
#[derive(Debug, Deserialize, Validate)]
pub struct QueryParams {
    #[validate(length(min = 3, max = 1000))]
    pub query: String,

    #[serde(default = "default_top_k")]
    #[validate(range(min = 1, max = 10))]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    pub query: String,
    pub retrieved_context: Vec<ScoredRecord>,
}

/// Nearest chunks for a natural-language query
pub async fn query(
    State(state): State<AppState>,
    params: std::result::Result<Query<QueryParams>, QueryRejection>,
) -> Result<Json<QueryResponse>> {
    let Query(params) = params.map_err(|rejection| {
        AppError::query_validation(format!("Invalid query parameters: {}", rejection.body_text()))
    })?;

    params
        .validate()
        .map_err(|e| AppError::query_validation(e.to_string()))?;

    let retrieved_context = state.query.answer(&params.query, params.top_k).await?;

    tracing::info!(
        query = %params.query,
        top_k = params.top_k,
        results = retrieved_context.len(),
        "Query completed"
    );

    Ok(Json(QueryResponse {
        status: "success".to_string(),
        query: params.query,
        retrieved_context,
    }))
}
