//! Session summarization from pasted text, an uploaded transcript, or an
//! uploaded recording.
//!
//! Uploads are rejected on their file name before any bytes are read or any
//! hosted API is called.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use bytes::Bytes;
use counsel_core::markdown::{parse_summary_sections, SummarySections};
use counsel_core::models::{ChatMessage, SummarizationResponse};
use counsel_core::prompts::{SUMMARIZATION_PARAMS, SUMMARIZATION_PROMPT};
use counsel_core::LlmClient;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::HttpState;

pub const TEXT_EXTENSIONS: [&str; 3] = [".txt", ".md", ".rtf"];
pub const AUDIO_EXTENSIONS: [&str; 4] = [".mp3", ".wav", ".m4a", ".ogg"];

pub const NO_TRANSCRIPT: &str = "No transcript text provided";
pub const UNSUPPORTED_FILE_FORMAT: &str = "Unsupported file format. Please upload a text file.";

pub fn unsupported_audio_format() -> String {
    format!(
        "Unsupported audio format. Supported formats: {}",
        AUDIO_EXTENSIONS.join(", ")
    )
}

/// Case-insensitive suffix match against `allowed`.
pub fn has_allowed_extension(file_name: &str, allowed: &[&str]) -> bool {
    let lower = file_name.to_lowercase();
    allowed.iter().any(|ext| lower.ends_with(ext))
}

/// An uploaded multipart file.
#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Pull the file part named `field_name`, checking its extension before the
/// body is read.
pub async fn read_upload(
    multipart: &mut Multipart,
    field_name: &str,
    allowed: &[&str],
    unsupported: &str,
) -> Result<Upload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(field_name) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if !has_allowed_extension(&file_name, allowed) {
            tracing::warn!(file_name = %file_name, field = field_name, "Rejected upload");
            return Err(ApiError::BadRequest(unsupported.to_string()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        return Ok(Upload { file_name, bytes });
    }

    Err(ApiError::Validation(format!(
        "Missing multipart field '{field_name}'"
    )))
}

/// Run the summarization prompt over `transcript` and split the reply into
/// summary and notes.
pub async fn summarize_transcript(
    llm: &LlmClient,
    transcript: &str,
) -> Result<SummarySections, ApiError> {
    let messages = [
        ChatMessage::system(SUMMARIZATION_PROMPT),
        ChatMessage::user(transcript.trim()),
    ];

    let content = llm
        .chat_completion(&messages, SUMMARIZATION_PARAMS)
        .await
        .map_err(|e| ApiError::Upstream(format!("Summarization failed: {e}")))?;

    Ok(parse_summary_sections(&content))
}

async fn respond(llm: &LlmClient, transcript: String) -> Result<SummarizationResponse, ApiError> {
    let sections = summarize_transcript(llm, &transcript).await?;
    Ok(SummarizationResponse {
        transcript,
        summary: sections.summary,
        notes: sections.notes,
    })
}

pub async fn summarize_text_inner(
    llm: &LlmClient,
    body: &Value,
) -> Result<SummarizationResponse, ApiError> {
    let transcript = match body.get("text").and_then(Value::as_str) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => return Err(ApiError::BadRequest(NO_TRANSCRIPT.to_string())),
    };
    respond(llm, transcript).await
}

pub async fn summarize_file_inner(
    llm: &LlmClient,
    upload: Upload,
) -> Result<SummarizationResponse, ApiError> {
    let transcript = String::from_utf8(upload.bytes.to_vec()).map_err(|_| {
        ApiError::BadRequest(format!("{} is not valid UTF-8 text", upload.file_name))
    })?;
    respond(llm, transcript).await
}

pub async fn summarize_audio_inner(
    llm: &LlmClient,
    upload: Upload,
) -> Result<SummarizationResponse, ApiError> {
    tracing::info!(
        file_name = %upload.file_name,
        bytes = upload.bytes.len(),
        "Transcribing session audio"
    );

    let transcript = llm
        .transcribe(&upload.file_name, upload.bytes.to_vec())
        .await
        .map_err(|e| ApiError::Upstream(format!("Audio transcription failed: {e}")))?;

    respond(llm, transcript).await
}

pub async fn summarize_text_handler(
    State(state): State<Arc<HttpState>>,
    Json(body): Json<Value>,
) -> Result<Json<SummarizationResponse>, ApiError> {
    summarize_text_inner(&state.llm, &body).await.map(Json)
}

pub async fn summarize_file_handler(
    State(state): State<Arc<HttpState>>,
    mut multipart: Multipart,
) -> Result<Json<SummarizationResponse>, ApiError> {
    let upload = read_upload(
        &mut multipart,
        "file",
        &TEXT_EXTENSIONS,
        UNSUPPORTED_FILE_FORMAT,
    )
    .await?;
    summarize_file_inner(&state.llm, upload).await.map(Json)
}

pub async fn summarize_audio_handler(
    State(state): State<Arc<HttpState>>,
    mut multipart: Multipart,
) -> Result<Json<SummarizationResponse>, ApiError> {
    let upload = read_upload(
        &mut multipart,
        "audio",
        &AUDIO_EXTENSIONS,
        &unsupported_audio_format(),
    )
    .await?;
    summarize_audio_inner(&state.llm, upload).await.map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use counsel_core::config::LlmConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> LlmClient {
        let config = LlmConfig {
            base_url: server.uri(),
            ..LlmConfig::default()
        };
        LlmClient::new("test-key", config).unwrap()
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        assert!(has_allowed_extension("session.TXT", &TEXT_EXTENSIONS));
        assert!(has_allowed_extension("notes.md", &TEXT_EXTENSIONS));
        assert!(has_allowed_extension("Intake.M4A", &AUDIO_EXTENSIONS));
        assert!(!has_allowed_extension("session.pdf", &TEXT_EXTENSIONS));
        assert!(!has_allowed_extension("txt", &TEXT_EXTENSIONS));
        assert!(!has_allowed_extension("", &AUDIO_EXTENSIONS));
    }

    #[test]
    fn test_unsupported_audio_message_lists_formats() {
        assert_eq!(
            unsupported_audio_format(),
            "Unsupported audio format. Supported formats: .mp3, .wav, .m4a, .ogg"
        );
    }

    #[tokio::test]
    async fn test_text_inner_rejects_missing_and_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let llm = client_for(&server);

        for body in [
            serde_json::json!({}),
            serde_json::json!({ "text": "" }),
            serde_json::json!({ "text": 42 }),
        ] {
            let err = summarize_text_inner(&llm, &body).await.unwrap_err();
            match err {
                ApiError::BadRequest(msg) => assert_eq!(msg, NO_TRANSCRIPT),
                other => panic!("expected bad request, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_file_inner_rejects_invalid_utf8() {
        let server = MockServer::start().await;
        let llm = client_for(&server);
        let upload = Upload {
            file_name: "session.txt".to_string(),
            bytes: Bytes::from_static(b"\xff\xfe\x00"),
        };
        let err = summarize_file_inner(&llm, upload).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_summarization_failure_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": { "message": "overloaded" }
            })))
            .mount(&server)
            .await;
        let llm = client_for(&server);

        let err = summarize_text_inner(&llm, &serde_json::json!({ "text": "hello" }))
            .await
            .unwrap_err();
        match err {
            ApiError::Upstream(msg) => {
                assert!(msg.starts_with("Summarization failed: "), "got: {msg}");
                assert!(msg.contains("overloaded"), "got: {msg}");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_audio_transcription_failure_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad audio"))
            .mount(&server)
            .await;
        let llm = client_for(&server);

        let upload = Upload {
            file_name: "session.wav".to_string(),
            bytes: Bytes::from_static(b"RIFF"),
        };
        let err = summarize_audio_inner(&llm, upload).await.unwrap_err();
        match err {
            ApiError::Upstream(msg) => {
                assert!(msg.starts_with("Audio transcription failed: "), "got: {msg}")
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }
}
