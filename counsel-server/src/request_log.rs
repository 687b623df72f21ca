//! Request logging middleware
//!
//! Every request outside the excluded path set is written to `request_logs`:
//! method, path, rendered request/response bodies and the status code. Both
//! bodies are buffered and handed on unchanged, so handlers and clients see
//! the original bytes.
//!
//! Request bodies are read up to `service.max_upload_bytes`. Anything larger
//! is answered with a 413 before a handler runs, and the row records a marker
//! in place of the body.
//!
//! The log write sits on the response path. If the store fails, the request
//! fails with a 500.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use counsel_core::models::NewRequestLog;
use sqlx::PgPool;

use crate::error::ApiError;
use crate::http::HttpState;

/// Appended to bodies cut at the character budget.
pub const TRUNCATION_MARKER: &str = "... [TRUNCATED]";

/// Responses may echo an upload back as escaped JSON.
const RESPONSE_LIMIT_FACTOR: usize = 8;

/// Logged in place of a request body that exceeded the upload limit.
pub fn oversized_body_marker(limit: usize) -> String {
    format!("[BODY OMITTED: exceeds {limit} bytes]")
}

/// Sink for request log rows.
#[async_trait]
pub trait RequestLogStore: Send + Sync {
    async fn append(&self, entry: &NewRequestLog) -> anyhow::Result<()>;
}

/// PostgreSQL store; each row is committed in its own transaction.
#[derive(Debug, Clone)]
pub struct PgRequestLogStore {
    pool: PgPool,
}

impl PgRequestLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestLogStore for PgRequestLogStore {
    async fn append(&self, entry: &NewRequestLog) -> anyhow::Result<()> {
        let id = counsel_core::db::insert_request_log(&self.pool, entry).await?;
        tracing::debug!(id, path = %entry.path, status = entry.status_code, "Request logged");
        Ok(())
    }
}

/// Pretty-print JSON bodies; otherwise decode as UTF-8, dropping invalid bytes.
pub fn render_body(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => serde_json::from_str::<serde_json::Value>(text)
            .ok()
            .and_then(|value| serde_json::to_string_pretty(&value).ok())
            .unwrap_or_else(|| text.to_string()),
        Err(_) => bytes.utf8_chunks().map(|chunk| chunk.valid()).collect(),
    }
}

/// Keep at most `max_chars` characters, marking the cut.
pub fn truncate_body(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut truncated = String::with_capacity(cut + TRUNCATION_MARKER.len());
            truncated.push_str(&text[..cut]);
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => text,
    }
}

/// Whether `path` is exempt from logging, either as-is or with the API
/// prefix removed.
pub fn is_excluded(excluded: &[String], api_prefix: &str, path: &str) -> bool {
    let prefix = api_prefix.trim_end_matches('/');
    let relative = match path.strip_prefix(prefix) {
        Some(rest) if !prefix.is_empty() && rest.starts_with('/') => Some(rest),
        _ => None,
    };
    excluded
        .iter()
        .any(|p| p == path || relative.is_some_and(|r| p == r))
}

pub async fn log_requests(
    State(state): State<Arc<HttpState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if is_excluded(
        &state.config.request_log.excluded_paths,
        &state.config.service.api_prefix,
        &path,
    ) {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let limit = state.config.service.max_upload_bytes;
    let (parts, body) = request.into_parts();
    let request_bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %path, limit, error = %e, "Request body rejected");
            let response = ApiError::PayloadTooLarge(limit).into_response();
            return record(&state, method, path, oversized_body_marker(limit), response).await;
        }
    };
    let request_body = truncate_body(
        render_body(&request_bytes),
        state.config.request_log.max_body_chars,
    );

    let response = next
        .run(Request::from_parts(parts, Body::from(request_bytes)))
        .await;

    record(&state, method, path, request_body, response).await
}

/// Buffer the response, append the log row, and hand the response back.
async fn record(
    state: &HttpState,
    method: String,
    path: String,
    request_body: String,
    response: Response,
) -> Response {
    let limit = state
        .config
        .service
        .max_upload_bytes
        .saturating_mul(RESPONSE_LIMIT_FACTOR);
    let (parts, body) = response.into_parts();
    let response_bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return ApiError::Internal(anyhow::anyhow!("failed to buffer response body: {e}"))
                .into_response();
        }
    };
    let response_body = truncate_body(
        render_body(&response_bytes),
        state.config.request_log.max_body_chars,
    );

    let entry = NewRequestLog {
        method,
        path,
        request_body,
        response_body,
        status_code: i32::from(parts.status.as_u16()),
    };

    if let Err(e) = state.log_store.append(&entry).await {
        return ApiError::Internal(e.context("request log write failed")).into_response();
    }

    Response::from_parts(parts, Body::from(response_bytes))
}
