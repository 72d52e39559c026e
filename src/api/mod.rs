//! HTTP handlers and the JSON error type they share.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::RetrievalError;

pub mod documents;
pub mod search;

/// Handler error rendered as `{"error": "message"}`.
#[derive(Debug)]
pub enum ApiError {
    /// Invalid request parameters (400).
    BadRequest(String),
    /// Unknown document (404).
    NotFound(String),
    /// An upstream service failed (502).
    BadGateway(String),
    /// An upstream service did not answer in time (504).
    GatewayTimeout(String),
    /// Unexpected server error (500).
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

impl From<RetrievalError> for ApiError {
    fn from(err: RetrievalError) -> Self {
        let message = err.to_string();
        match err {
            RetrievalError::InvalidRequest(_) => ApiError::BadRequest(message),
            RetrievalError::Timeout { .. } => ApiError::GatewayTimeout(message),
            RetrievalError::Upstream { .. } | RetrievalError::Generation(_) => {
                tracing::error!("{message}");
                ApiError::BadGateway(message)
            }
        }
    }
}
