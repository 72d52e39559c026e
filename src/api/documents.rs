use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::api::ApiError;
use crate::llm::embeddings::embed_batch;
use crate::models::{IngestRequest, IngestResponse, NewDocument, RetrievedDocument};
use crate::search::vector::VectorStore;
use crate::state::AppState;

const MAX_INGEST_BATCH: usize = 256;

/// Assign ids and reject empty or oversized batches.
fn prepare_documents(docs: Vec<NewDocument>) -> Result<Vec<RetrievedDocument>, ApiError> {
    if docs.is_empty() {
        return Err(ApiError::BadRequest("No documents provided".to_string()));
    }
    if docs.len() > MAX_INGEST_BATCH {
        return Err(ApiError::BadRequest(format!(
            "At most {MAX_INGEST_BATCH} documents per request"
        )));
    }

    let mut seen = HashSet::new();
    docs.into_iter()
        .enumerate()
        .map(|(i, d)| {
            if d.content.trim().is_empty() {
                return Err(ApiError::BadRequest(format!("Document {i} has no content")));
            }
            let id = match d.id.map(|id| id.trim().to_string()) {
                Some(id) if !id.is_empty() => id,
                _ => Uuid::new_v4().to_string(),
            };
            if !seen.insert(id.clone()) {
                return Err(ApiError::BadRequest(format!(
                    "Document {i} repeats id {id}"
                )));
            }
            Ok(RetrievedDocument {
                id,
                content: d.content,
                metadata: d.metadata,
                score: None,
            })
        })
        .collect()
}

/// Write the vector store, then the keyword index. A keyword failure undoes
/// the vector write so the two indexes keep the same documents.
fn write_indexes(
    vectors: &VectorStore,
    docs: &[RetrievedDocument],
    embeddings: Vec<Vec<f32>>,
    index_keywords: impl FnOnce(&[RetrievedDocument]) -> anyhow::Result<()>,
) -> Result<(), ApiError> {
    let undo = vectors
        .add_documents(docs, embeddings)
        .map_err(|e| ApiError::Internal(format!("Vector store error: {e:#}")))?;

    if let Err(e) = index_keywords(docs) {
        if let Err(undo_err) = vectors.undo(undo) {
            tracing::error!("Failed to roll back vector store after BM25 error: {undo_err:#}");
        }
        return Err(ApiError::Internal(format!("BM25 index error: {e:#}")));
    }
    Ok(())
}

/// POST /api/documents - Embed documents and add them to both indexes.
pub async fn ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let docs = prepare_documents(req.documents)?;

    let texts: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
    let embeddings = embed_batch(&state.http_client, &state.config.llm, &texts)
        .await
        .map_err(|e| ApiError::BadGateway(format!("Embedding failed: {e:#}")))?;

    let vectors = state.vectors.clone();
    let bm25 = state.bm25.clone();
    let written = docs.clone();
    tokio::task::spawn_blocking(move || {
        write_indexes(&vectors, &written, embeddings, |d| bm25.index_documents(d))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Index write task failed: {e}")))??;

    let ids: Vec<String> = docs.into_iter().map(|d| d.id).collect();
    tracing::info!("Indexed {} documents", ids.len());

    Ok(Json(IngestResponse {
        indexed: ids.len(),
        ids,
    }))
}

/// DELETE /api/documents/{id} - Remove a document from both indexes.
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .vectors
        .delete(&id)
        .map_err(|e| ApiError::Internal(format!("Vector store error: {e:#}")))?;

    let bm25 = state.bm25.clone();
    let keyword_id = id.clone();
    tokio::task::spawn_blocking(move || bm25.delete(&keyword_id))
        .await
        .map_err(|e| ApiError::Internal(format!("BM25 index error: {e}")))?
        .map_err(|e| ApiError::Internal(format!("BM25 index error: {e:#}")))?;

    if !removed {
        return Err(ApiError::NotFound(format!("Document {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/health - Index sizes.
pub async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let keyword_documents = state
        .bm25
        .doc_count()
        .map_err(|e| ApiError::Internal(format!("BM25 index error: {e:#}")))?;

    Ok(Json(json!({
        "status": "ok",
        "vector_entries": state.vectors.entry_count(),
        "keyword_documents": keyword_documents,
    })))
}
