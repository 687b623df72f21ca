//! Counselor-guidance chat.
//!
//! The body is parsed by hand rather than through the `Json` extractor: every
//! failure in this route, malformed JSON included, is answered with
//! `400 {"error": "Bad request: ..."}`.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use bytes::Bytes;
use counsel_core::models::{history_to_messages, ChatMessage};
use counsel_core::prompts::{chat_system_prompt, CHAT_PARAMS};
use counsel_core::LlmClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::http::HttpState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub category: String,
}

/// Fields pulled from the request body; absent keys default to empty.
#[derive(Debug, Default, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub category: String,
    pub history: Vec<Value>,
}

impl ChatRequest {
    pub fn parse(body: &[u8]) -> Result<Self, ApiError> {
        let data: Value =
            serde_json::from_slice(body).map_err(|e| ApiError::Chat(e.to_string()))?;
        let obj = data
            .as_object()
            .ok_or_else(|| ApiError::Chat("request body must be a JSON object".to_string()))?;

        let text_field = |key: &str| -> Result<String, ApiError> {
            match obj.get(key) {
                None | Some(Value::Null) => Ok(String::new()),
                Some(Value::String(s)) => Ok(s.clone()),
                Some(other) => Err(ApiError::Chat(format!(
                    "'{key}' must be a string, got {other}"
                ))),
            }
        };

        let history = match obj.get("history") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => return Err(ApiError::Chat("'history' must be a list".to_string())),
        };

        Ok(Self {
            message: text_field("message")?,
            category: text_field("category")?,
            history,
        })
    }

    /// System prompt, then the converted history, then the new message.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(chat_system_prompt(&self.category)));
        messages.extend(history_to_messages(&self.history));
        messages.push(ChatMessage::user(self.message.clone()));
        messages
    }
}

pub async fn chat_inner(llm: &LlmClient, body: &[u8]) -> Result<ChatResponse, ApiError> {
    let request = ChatRequest::parse(body)?;
    let messages = request.to_messages();

    tracing::debug!(
        category = %request.category,
        history = request.history.len(),
        messages = messages.len(),
        "Forwarding chat"
    );

    let response = llm
        .chat_completion(&messages, CHAT_PARAMS)
        .await
        .map_err(|e| ApiError::Chat(e.to_string()))?;

    Ok(ChatResponse {
        response,
        category: request.category,
    })
}

pub async fn chat_handler(
    State(state): State<Arc<HttpState>>,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    chat_inner(&state.llm, &body).await.map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use counsel_core::models::Role;
    use serde_json::json;

    #[test]
    fn test_parse_defaults_missing_fields() {
        let req = ChatRequest::parse(b"{}").unwrap();
        assert_eq!(req, ChatRequest::default());
    }

    #[test]
    fn test_parse_malformed_json_is_chat_error() {
        let err = ChatRequest::parse(b"{not json").unwrap_err();
        match err {
            ApiError::Chat(msg) => assert!(!msg.is_empty()),
            other => panic!("expected chat error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_non_list_history() {
        let err = ChatRequest::parse(br#"{"history": "oops"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Chat(_)));
    }

    #[test]
    fn test_messages_order_and_roles() {
        let body = json!({
            "message": "What should I say next?",
            "category": "grief",
            "history": [
                {"id": 1, "sender": "user", "content": "My client lost a parent."},
                {"id": 2, "sender": "bot", "content": "Start by acknowledging the loss."},
                {"id": 3, "content": "no sender, skipped"},
                "not an object"
            ]
        });
        let req = ChatRequest::parse(body.to_string().as_bytes()).unwrap();
        let messages = req.to_messages();

        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert!(messages[0].content.contains("related to the category: grief."));
        assert_eq!(messages[1].content, "My client lost a parent.");
        assert_eq!(messages[3].content, "What should I say next?");
    }
}
