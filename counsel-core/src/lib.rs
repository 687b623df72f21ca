pub mod classifier;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod markdown;
pub mod models;
pub mod prompts;
pub mod vector_index;

pub use classifier::{Classification, ClassifierError, OnnxClassifier, TextClassifier};
pub use config::CounselConfig;
pub use embeddings::{EmbeddingBackend, EmbeddingError, OpenAiEmbeddingClient};
pub use error::CounselError;
pub use llm::{GenerationParams, LlmClient, LlmError};
pub use vector_index::{ExampleMatches, ExampleStore, FlatIndex, IndexError, TieredIndex};
