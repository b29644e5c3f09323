use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::ErrorBody;

/// Top-level application error. Every variant carries the exact message the
/// client sees in the `{ "error": ... }` body.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Client input errors ──────────────────────────────────────────────────
    #[error("Missing messages in request")]
    MissingMessages,

    #[error("Missing 'values' in request")]
    MissingValues,

    // ── Configuration errors ─────────────────────────────────────────────────
    #[error("OpenAI API key is not configured")]
    MissingApiKey,

    // ── Upstream errors ──────────────────────────────────────────────────────
    #[error("{0}")]
    Upstream(String),

    #[error("Malformed stream chunk: {0}")]
    MalformedChunk(String),
}

impl AppError {
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::MissingMessages | AppError::MissingValues)
    }

    pub fn status(&self) -> StatusCode {
        if self.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
