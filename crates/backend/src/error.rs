//! Unified error handling for the backend API.
//!
//! `ApiError` implements `IntoResponse`, so handlers use `?` on store and
//! analysis errors and every failure ends as a JSON `{ error }` body. Internal
//! detail is logged, never returned for 5xx responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::repository::StoreError;
use crate::services::AnalysisError;

/// API error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Unified error type for API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Authentication required but not provided or invalid
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Wall-clock budget for a bulk run exceeded
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Store(e) => store_status(e),
            ApiError::Analysis(e) => match e {
                AnalysisError::NotFound => (StatusCode::NOT_FOUND, "Email not found".to_string()),
                AnalysisError::Fetch(store) => store_status(store),
                AnalysisError::Analysis(inner) => {
                    tracing::error!("Analysis failed: {}", inner);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Analysis failed".to_string(),
                    )
                }
                AnalysisError::Timeout(budget) => {
                    tracing::error!("Analysis exceeded {:?}", budget);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Analysis failed".to_string(),
                    )
                }
            },
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Timeout(budget) => {
                tracing::error!("Request exceeded {:?}", budget);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "Request timed out".to_string(),
                )
            }
        }
    }
}

fn store_status(err: &StoreError) -> (StatusCode, String) {
    match err {
        StoreError::NotFound(resource) => {
            (StatusCode::NOT_FOUND, format!("{} not found", resource))
        }
        StoreError::Unavailable(e) => {
            tracing::error!("Connection pool error: {:?}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Database connection unavailable".to_string(),
            )
        }
        StoreError::Query(e) => {
            tracing::error!("Database error: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database operation failed".to_string(),
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
