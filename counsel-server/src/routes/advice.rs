use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::Form;
use counsel_core::markdown::{advice_card, render_html};
use counsel_core::models::ChatMessage;
use counsel_core::prompts::{ADVICE_PARAMS, ADVICE_SYSTEM_PROMPT};
use counsel_core::LlmClient;
use serde::Deserialize;

use crate::error::ApiError;
use crate::http::HttpState;

#[derive(Debug, Deserialize)]
pub struct AdviceForm {
    pub problem: String,
}

/// Generate a counseling plan for `problem` and return it as a styled HTML card.
pub async fn advice_inner(llm: &LlmClient, problem: &str) -> Result<String, ApiError> {
    let messages = [
        ChatMessage::system(ADVICE_SYSTEM_PROMPT),
        ChatMessage::user(problem.trim()),
    ];

    let advice = llm
        .chat_completion(&messages, ADVICE_PARAMS)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(advice_card(&render_html(&advice)))
}

pub async fn advice_handler(
    State(state): State<Arc<HttpState>>,
    Form(form): Form<AdviceForm>,
) -> Result<Html<String>, ApiError> {
    advice_inner(&state.llm, &form.problem).await.map(Html)
}
