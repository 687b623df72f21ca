//! Hosted language-model client (OpenAI-compatible API)
//!
//! Covers the two calls the counsel backend makes against the hosted LLM:
//! - `POST /chat/completions` — advice, chat guidance, session summaries
//! - `POST /audio/transcriptions` — speech-to-text for uploaded sessions
//!
//! Calls are made once. There is no retry or rate-limit handling here; a failed
//! call surfaces as an `LlmError` and the route decides the HTTP status.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{LlmConfig, OPENAI_API_KEY_ENV};
use crate::models::ChatMessage;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Response contained no choices")]
    EmptyResponse,

    #[error("Missing API key")]
    MissingApiKey,
}

/// Sampling parameters for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>, config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    /// Build a client using `OPENAI_API_KEY` from the environment.
    pub fn from_env(config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(OPENAI_API_KEY_ENV).unwrap_or_default();
        Self::new(api_key, config)
    }

    pub fn chat_model(&self) -> &str {
        &self.config.chat_model
    }

    /// Run one chat completion and return the first choice's text.
    pub async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let request = ChatCompletionRequest {
            model: &self.config.chat_model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        tracing::debug!(
            model = %self.config.chat_model,
            messages = messages.len(),
            "Sending chat completion"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let response = check_status(response).await?;
        let completion: ChatCompletionResponse = response.json().await?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;

        Ok(choice.message.content.unwrap_or_default())
    }

    /// Transcribe an audio upload. `file_name` carries the extension the API
    /// uses to detect the container format.
    pub async fn transcribe(&self, file_name: &str, audio: Vec<u8>) -> Result<String, LlmError> {
        let url = format!("{}/audio/transcriptions", self.config.base_url);
        let form = Form::new()
            .part("file", Part::bytes(audio).file_name(file_name.to_string()))
            .text("model", self.config.transcription_model.clone())
            .text("language", self.config.transcription_language.clone());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let response = check_status(response).await?;
        let transcription: TranscriptionResponse = response.json().await?;
        Ok(transcription.text)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorResponse>(&body)
        .ok()
        .and_then(|e| e.error)
        .map(|e| e.message)
        .unwrap_or(body);

    tracing::error!(code = status.as_u16(), message = %message, "LLM API error");

    Err(LlmError::Api {
        code: status.as_u16(),
        message,
    })
}
