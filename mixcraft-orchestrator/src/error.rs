//! Error types for mixcraft-orchestrator

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type, mapped to an HTTP status + JSON body by `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown session (404)
    #[error("Session not found: {0}")]
    UnknownSession(String),

    /// Session exists but the requested artifact isn't ready yet (404)
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Generic not-found for resources other than sessions (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request input (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload exceeded the configured size cap (400)
    #[error("Payload too large: {0}")]
    TooLarge(String),

    /// Audio analysis failed outright for a required track (422)
    #[error("Analysis failed: {0}")]
    Analysis(String),

    /// Strategy decision failed even after heuristic fallback (502)
    #[error("Strategy decision failed: {0}")]
    Strategy(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// mixcraft-common error
    #[error("Common error: {0}")]
    Common(#[from] mixcraft_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::UnknownSession(msg) => (StatusCode::NOT_FOUND, "UNKNOWN_SESSION", msg.clone()),
            ApiError::NotReady(msg) => (StatusCode::NOT_FOUND, "NOT_READY", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::TooLarge(msg) => (StatusCode::BAD_REQUEST, "TOO_LARGE", msg.clone()),
            ApiError::Analysis(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "ANALYSIS_FAILED", msg.clone())
            }
            ApiError::Strategy(msg) => (StatusCode::BAD_GATEWAY, "STRATEGY_FAILED", msg.clone()),
            ApiError::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Other(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::Common(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
