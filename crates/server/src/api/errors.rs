//! API error types mapped to HTTP status codes.
//!
//! Each [`ApiError`] variant maps to a specific HTTP status code and produces
//! a JSON response body `{"error": "message"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use catalogdb_core::{CatalogError, PipelineError};
use serde_json::json;

/// Application-level error type that implements `IntoResponse`.
///
/// - `NotFound` → 404
/// - `BadRequest` → 400
/// - `Conflict` → 409
/// - `Internal` → 500
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found (404).
    NotFound(String),
    /// Invalid request parameters or body (400).
    BadRequest(String),
    /// Another active record holds the natural key (409).
    Conflict(String),
    /// Unexpected server error (500).
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        let body = axum::Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let root = match &err {
            CatalogError::Batch { source, .. } => source.as_ref(),
            other => other,
        };
        match root {
            CatalogError::Validation { .. } => ApiError::BadRequest(err.to_string()),
            CatalogError::Duplicate { .. } => ApiError::Conflict(err.to_string()),
            // Soft-deleted records are invisible to clients.
            CatalogError::NotFound(_) | CatalogError::Inactive(_) => {
                ApiError::NotFound(err.to_string())
            }
            CatalogError::Batch { .. } => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn status(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_catalog_errors_map_to_status_codes() {
        let duplicate = || CatalogError::Duplicate {
            platform: "Netflix".into(),
            title: "A".into(),
            year: 2020,
        };
        assert_eq!(status(duplicate()), StatusCode::CONFLICT);
        assert_eq!(status(CatalogError::Inactive(Uuid::new_v4())), StatusCode::NOT_FOUND);
        assert_eq!(
            status(CatalogError::Batch {
                index: 3,
                source: Box::new(duplicate()),
            }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_pipeline_errors_are_bad_requests() {
        assert_eq!(
            status(PipelineError::UnknownDimension("colour".into())),
            StatusCode::BAD_REQUEST
        );
    }
}
