//! Request error handling.
//!
//! Every refused request answers with the shared error envelope
//! (`errorCode` + `message`) so clients can branch on the code. Result
//! probes hitting a session whose verdict is still outstanding get
//! `RESULT_NOT_READY`, which is deliberately distinct from
//! `SESSION_NOT_FOUND` for unknown or expired sessions.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use vita_core::types::ErrorEnvelope;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The session exists but its result has not been published yet.
    #[error("result not ready: {0}")]
    ResultNotReady(String),

    /// Unknown session id, or a session that aged out.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Unknown face id within a known bio-session.
    #[error("face not found: {0}")]
    FaceNotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::ResultNotReady(msg) => (StatusCode::NOT_FOUND, "RESULT_NOT_READY", msg),
            ApiError::SessionNotFound(msg) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", msg),
            ApiError::FaceNotFound(msg) => (StatusCode::NOT_FOUND, "FACE_NOT_FOUND", msg),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", msg),
        };

        // Not-ready answers are routine polling traffic, keep them quiet.
        if error_code == "RESULT_NOT_READY" {
            tracing::debug!(%status, error_code, %message, "request refused");
        } else {
            tracing::warn!(%status, error_code, %message, "request failed");
        }

        let body = Json(ErrorEnvelope {
            error_code: error_code.to_string(),
            message,
        });
        (status, body).into_response()
    }
}
