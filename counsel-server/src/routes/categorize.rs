use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use counsel_core::prompts::categorize_greeting;
use counsel_core::TextClassifier;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::http::HttpState;

#[derive(Debug, Deserialize)]
pub struct CategorizeRequest {
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizeResponse {
    pub category: String,
    pub response: String,
}

pub async fn categorize_inner(
    classifier: &dyn TextClassifier,
    question: &str,
) -> Result<CategorizeResponse, ApiError> {
    let classification = classifier
        .classify(question)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    tracing::debug!(
        label = %classification.label,
        index = classification.index,
        "Question categorized"
    );

    Ok(CategorizeResponse {
        response: categorize_greeting(&classification.label),
        category: classification.label,
    })
}

pub async fn categorize_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<CategorizeRequest>,
) -> Result<Json<CategorizeResponse>, ApiError> {
    categorize_inner(state.classifier.as_ref(), &req.question)
        .await
        .map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use counsel_core::classifier::select_label;
    use counsel_core::{Classification, ClassifierError};

    struct FixedLogits {
        labels: Vec<String>,
        logits: Vec<f32>,
    }

    #[async_trait]
    impl TextClassifier for FixedLogits {
        async fn classify(&self, _text: &str) -> Result<Classification, ClassifierError> {
            select_label(&self.labels, self.logits.clone())
        }

        fn labels(&self) -> &[String] {
            &self.labels
        }
    }

    fn labels() -> Vec<String> {
        ["anxiety", "depression", "relationships"]
            .iter()
            .map(|l| l.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_categorize_inner_picks_top_label() {
        let classifier = FixedLogits {
            labels: labels(),
            logits: vec![0.1, 2.5, -1.0],
        };
        let resp = categorize_inner(&classifier, "I can't get out of bed")
            .await
            .unwrap();
        assert_eq!(resp.category, "depression");
        assert_eq!(
            resp.response,
            "Hi, looks like you are dealing with a depression issue. How can I help you today?"
        );
    }

    #[tokio::test]
    async fn test_categorize_inner_empty_logits_is_internal() {
        let classifier = FixedLogits {
            labels: labels(),
            logits: vec![],
        };
        let err = categorize_inner(&classifier, "hello").await.unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
