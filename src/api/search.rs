use axum::extract::State;
use axum::Json;

use crate::api::ApiError;
use crate::models::{HybridSearchResponse, RetrieveResponse, SearchRequest};
use crate::state::AppState;

/// POST /api/retrieve - Semantic + keyword retrieval with weighted fusion,
/// without answer generation.
pub async fn retrieve(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<RetrieveResponse>, ApiError> {
    let response = state.pipeline.retrieve(&req).await?;
    Ok(Json(response))
}

/// POST /api/hybrid-search - Full pipeline:
///   1. Semantic (embed + vector) and keyword (BM25) search, concurrently
///   2. Per-source max normalization and weighted fusion
///   3. Top-K truncation with relevance tiers
///   4. Answer generation over the top-K contents
pub async fn hybrid_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<HybridSearchResponse>, ApiError> {
    let response = state.pipeline.answer(&req).await?;
    tracing::info!(
        "Answered '{}' from {} sources",
        req.query.trim(),
        response.sources.len()
    );
    Ok(Json(response))
}
