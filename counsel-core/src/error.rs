use thiserror::Error;

use crate::classifier::ClassifierError;
use crate::embeddings::EmbeddingError;
use crate::llm::LlmError;
use crate::vector_index::IndexError;

#[derive(Error, Debug)]
pub enum CounselError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}
