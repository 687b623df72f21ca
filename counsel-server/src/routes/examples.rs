use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use counsel_core::models::{format_example_history, ExampleHistoryEntry};
use counsel_core::{EmbeddingBackend, ExampleStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::http::HttpState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExamplesRequest {
    pub history: Vec<ExampleHistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamplesResponse {
    pub high_quality: Vec<String>,
    pub low_quality: Vec<String>,
}

/// Embed the flattened history and return the nearest conversations from
/// each quality tier.
pub async fn examples_inner(
    embedder: &dyn EmbeddingBackend,
    store: &ExampleStore,
    history: &[ExampleHistoryEntry],
    top_k: usize,
) -> Result<ExamplesResponse, ApiError> {
    let query = format_example_history(history);
    let embedding = embedder
        .embed(&query)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    let matches = store
        .search(&embedding, top_k)
        .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(ExamplesResponse {
        high_quality: matches.high_quality,
        low_quality: matches.low_quality,
    })
}

pub async fn examples_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ExamplesRequest>,
) -> Result<Json<ExamplesResponse>, ApiError> {
    examples_inner(
        state.embedder.as_ref(),
        &state.examples,
        &req.history,
        state.config.examples.top_k,
    )
    .await
    .map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_uses_camel_case_keys() {
        let resp = ExamplesResponse {
            high_quality: vec!["counselor: hi".into()],
            low_quality: vec![],
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            serde_json::json!({ "highQuality": ["counselor: hi"], "lowQuality": [] })
        );
    }

    #[test]
    fn test_request_history_defaults_empty() {
        let req: ExamplesRequest = serde_json::from_str("{}").unwrap();
        assert!(req.history.is_empty());
    }
}
