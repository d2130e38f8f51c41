//! Structured error response shaping for the HTTP transport boundary,
//! implementing the error-routing table: `Validation`->400, `NotFound`->404,
//! `ExternalServiceUnavailable`->503 with `Retry-After`, `Internal`->500.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::PipelineError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub status: u16,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub request_id: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

fn status_and_code(error: &PipelineError) -> (StatusCode, &'static str) {
    match error {
        PipelineError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION"),
        PipelineError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        PipelineError::ExternalServiceUnavailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "EXTERNAL_SERVICE_UNAVAILABLE")
        }
        PipelineError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
    }
}

/// Maps a `PipelineError` to its HTTP response, including a `Retry-After`
/// header for `ExternalServiceUnavailable`. `debug` gates the inclusion of
/// the `Debug` rendering of the error in the body (per-request opt-in).
pub fn handle_error(error: &PipelineError, path: &str, debug: bool) -> Response {
    let (status, code) = status_and_code(error);

    let mut headers = HeaderMap::new();
    if let PipelineError::ExternalServiceUnavailable {
        retry_after_seconds,
        ..
    } = error
    {
        if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
            headers.insert(header::RETRY_AFTER, value);
        }
    }

    let body = ErrorBody {
        error: code.to_string(),
        status: status.as_u16(),
        message: error.to_string(),
        timestamp: chrono::Utc::now(),
        request_id: Uuid::new_v4().to_string(),
        path: path.to_string(),
        debug: debug.then(|| format!("{error:?}")),
    };

    (status, headers, Json(body)).into_response()
}
