//! Counsel HTTP API
//!
//! Axum router exposing the counseling endpoints under the configured prefix
//! (`/api` by default). `/` and `/health` answer both at the top level and
//! under the prefix.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function taking plain arguments, so the business logic is testable
//! without router dispatch.
//!
//! Endpoints:
//! - POST /advice               HTML counseling plan
//! - POST /categorize           topic label + greeting
//! - POST /chat                 counselor guidance for a running conversation
//! - POST /examples             nearest high/low quality example conversations
//! - POST /summarization/text   session summary from raw text
//! - POST /summarization/file   session summary from an uploaded text file
//! - POST /summarization/audio  session summary from an uploaded recording
//! - GET  /                     status message
//! - GET  /health               liveness (HEAD answered too)

use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use counsel_core::config::expand_path;
use counsel_core::{
    CounselConfig, CounselError, EmbeddingBackend, ExampleStore, LlmClient, OnnxClassifier,
    OpenAiEmbeddingClient, TextClassifier,
};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::request_log::{log_requests, PgRequestLogStore, RequestLogStore};
use crate::routes;

pub const ROOT_MESSAGE: &str = "Counsel backend is running";

/// Process-wide read-only state, built once at startup.
#[derive(Clone)]
pub struct HttpState {
    pub config: CounselConfig,
    pub llm: LlmClient,
    pub classifier: Arc<dyn TextClassifier>,
    pub embedder: Arc<dyn EmbeddingBackend>,
    pub examples: Arc<ExampleStore>,
    pub log_store: Arc<dyn RequestLogStore>,
}

impl HttpState {
    /// Build the hosted-API clients, load the classifier and example indexes,
    /// and log requests into `pool`.
    pub fn from_config(config: CounselConfig, pool: PgPool) -> Result<Self, CounselError> {
        let llm = LlmClient::from_env(config.llm.clone())?;
        let embedder = OpenAiEmbeddingClient::from_env(config.embedding.clone())?;
        let classifier = OnnxClassifier::new(&config.classifier)?;
        let examples = ExampleStore::load(&expand_path(&config.examples.index_dir))?;
        examples.ensure_dimensions(config.embedding.dimensions)?;

        tracing::info!(
            labels = classifier.labels().len(),
            embedder = embedder.name(),
            chat_model = llm.chat_model(),
            "Inference backends ready"
        );

        Ok(Self {
            config,
            llm,
            classifier: Arc::new(classifier),
            embedder: Arc::new(embedder),
            examples: Arc::new(examples),
            log_store: Arc::new(PgRequestLogStore::new(pool)),
        })
    }
}

/// Build the Axum router with all endpoints and cross-cutting layers.
pub fn build_router(state: Arc<HttpState>) -> Router {
    let api = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/advice", post(routes::advice::advice_handler))
        .route("/categorize", post(routes::categorize::categorize_handler))
        .route("/chat", post(routes::chat::chat_handler))
        .route("/examples", post(routes::examples::examples_handler))
        .route(
            "/summarization/text",
            post(routes::summarization::summarize_text_handler),
        )
        .route(
            "/summarization/file",
            post(routes::summarization::summarize_file_handler),
        )
        .route(
            "/summarization/audio",
            post(routes::summarization::summarize_audio_handler),
        );

    let prefix = state.config.service.api_prefix.trim_end_matches('/');
    let app = if prefix.is_empty() {
        api
    } else {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .nest(prefix, api)
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    app.layer(axum::middleware::from_fn_with_state(
        state.clone(),
        log_requests,
    ))
    .layer(TraceLayer::new_for_http())
    .layer(cors)
    .layer(DefaultBodyLimit::max(state.config.service.max_upload_bytes))
    .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: HttpState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!(
        "{}:{}",
        state.config.service.host, state.config.service.port
    );
    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Counsel HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

pub fn root_inner() -> serde_json::Value {
    serde_json::json!({ "message": ROOT_MESSAGE })
}

pub fn health_inner() -> serde_json::Value {
    serde_json::json!({ "status": "healthy" })
}

pub async fn root_handler() -> Json<serde_json::Value> {
    Json(root_inner())
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(health_inner())
}
