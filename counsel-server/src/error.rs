use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Errors surfaced by the HTTP routes.
///
/// The variants mirror the response shapes the front end already handles:
/// `{"detail": ..}` for validation and upstream failures, `{"error": ..}` for
/// the chat route, and a bare 500 for everything left untrapped.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    /// Request body larger than the configured upload limit, in bytes.
    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// Any failure inside the chat route, reported as a 400.
    #[error("Bad request: {0}")]
    Chat(String),

    /// A hosted-API failure the route reports with its cause.
    #[error("{0}")]
    Upstream(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "detail": detail })),
            )
                .into_response(),
            ApiError::Validation(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({ "detail": detail })),
            )
                .into_response(),
            err @ ApiError::PayloadTooLarge(_) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(serde_json::json!({ "detail": err.to_string() })),
            )
                .into_response(),
            err @ ApiError::Chat(_) => {
                tracing::warn!(error = %err, "Chat request failed");
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": err.to_string() })),
                )
                    .into_response()
            }
            ApiError::Upstream(detail) => {
                tracing::error!(detail = %detail, "Upstream call failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "detail": detail })),
                )
                    .into_response()
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), "Unhandled error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}
