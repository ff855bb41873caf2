//! Error types for wlab-ws
//!
//! `WsError` is the pipeline error: the recovered kinds
//! (`MissingReferenceData`, `NoCoverageData`) are matched by the workflow,
//! everything else is an internal computation error. `ApiError` is what HTTP
//! handlers return.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::engine::EngineError;

/// Pipeline error
#[derive(Debug, Error)]
pub enum WsError {
    /// Stored task type is neither classification nor extraction
    #[error("Task type {0} not implemented")]
    UnsupportedTaskType(String),

    /// Quality metrics requested without any manual reference labels
    #[error("No manual reference data available")]
    MissingReferenceData,

    /// Source hits zero records of its labeling task
    #[error("Information source {0} hits no records")]
    NoCoverageData(String),

    /// Labeling task, source or weak supervision task missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Aggregation engine failure other than missing reference data
    #[error("Aggregation engine error: {0}")]
    Engine(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode statistics: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for WsError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::MissingReferenceData => WsError::MissingReferenceData,
            EngineError::Computation(msg) => WsError::Engine(msg),
        }
    }
}

/// Result alias for pipeline operations
pub type WsResult<T> = Result<T, WsError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found or task type unsupported (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<WsError> for ApiError {
    fn from(err: WsError) -> Self {
        match err {
            WsError::UnsupportedTaskType(_) | WsError::NotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
