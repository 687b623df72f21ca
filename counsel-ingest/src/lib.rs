//! Offline builder for the example-retrieval indexes.
//!
//! Reads counseling transcripts from one directory, where the file name prefix
//! (`high_` / `low_`) marks the quality tier, embeds every transcript, and
//! writes one flat L2 index plus a JSON array of texts per tier. The server
//! loads the output directory read-only at startup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use counsel_core::vector_index::{HIGH_INDEX_FILE, HIGH_TEXTS_FILE, LOW_INDEX_FILE, LOW_TEXTS_FILE};
use counsel_core::{EmbeddingBackend, EmbeddingError, FlatIndex, IndexError};
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

pub const HIGH_PREFIX: &str = "high_";
pub const LOW_PREFIX: &str = "low_";

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Embedding transcript {position} failed after {attempts} attempts: {source}")]
    Embedding {
        position: usize,
        attempts: usize,
        source: EmbeddingError,
    },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Failed to write texts: {0}")]
    Texts(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> IngestError + '_ {
    move |source| IngestError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Backoff applied to each embedding call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub transcripts_dir: PathBuf,
    pub output_dir: PathBuf,
    pub retry: RetryPolicy,
}

/// Counts written by a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub high: usize,
    pub low: usize,
    pub dimensions: usize,
}

/// Read every file in `dir` whose name starts with `prefix`, in file-name order.
pub fn load_conversations(dir: &Path, prefix: &str) -> Result<Vec<String>, IngestError> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map_err(io_err(dir))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(prefix))
        .collect();
    names.sort();

    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            fs::read_to_string(&path).map_err(io_err(&path))
        })
        .collect()
}

/// Embed each text in order and collect the vectors into a flat index.
pub async fn build_tier(
    texts: &[String],
    backend: &dyn EmbeddingBackend,
    retry: RetryPolicy,
) -> Result<FlatIndex, IngestError> {
    let mut index = FlatIndex::new(backend.dimensions());

    for (position, text) in texts.iter().enumerate() {
        let strategy = ExponentialBackoff::from_millis(retry.base_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(retry.max_retries);

        let vector = Retry::spawn(strategy, || backend.embed(text))
            .await
            .map_err(|source| IngestError::Embedding {
                position,
                attempts: retry.max_retries + 1,
                source,
            })?;
        index.add(&vector)?;

        if (position + 1) % 25 == 0 {
            tracing::info!(done = position + 1, total = texts.len(), "Embedding progress");
        }
    }

    Ok(index)
}

fn write_texts(path: &Path, texts: &[String]) -> Result<(), IngestError> {
    let json = serde_json::to_string_pretty(texts)?;
    fs::write(path, json).map_err(io_err(path))
}

/// Build both tiers and write the four index files into `options.output_dir`.
pub async fn run(
    options: &IngestOptions,
    backend: &dyn EmbeddingBackend,
) -> Result<IngestSummary, IngestError> {
    let high_texts = load_conversations(&options.transcripts_dir, HIGH_PREFIX)?;
    let low_texts = load_conversations(&options.transcripts_dir, LOW_PREFIX)?;
    tracing::info!(
        dir = %options.transcripts_dir.display(),
        high = high_texts.len(),
        low = low_texts.len(),
        "Loaded transcripts"
    );
    if high_texts.is_empty() || low_texts.is_empty() {
        tracing::warn!("A quality tier is empty; /examples will return no matches for it");
    }

    tracing::info!(backend = backend.name(), "Embedding high-quality conversations");
    let high_index = build_tier(&high_texts, backend, options.retry).await?;
    tracing::info!(backend = backend.name(), "Embedding low-quality conversations");
    let low_index = build_tier(&low_texts, backend, options.retry).await?;

    let out = &options.output_dir;
    fs::create_dir_all(out).map_err(io_err(out))?;
    high_index.save(&out.join(HIGH_INDEX_FILE))?;
    low_index.save(&out.join(LOW_INDEX_FILE))?;
    write_texts(&out.join(HIGH_TEXTS_FILE), &high_texts)?;
    write_texts(&out.join(LOW_TEXTS_FILE), &low_texts)?;

    tracing::info!(dir = %out.display(), "Indexes written");

    Ok(IngestSummary {
        high: high_index.len(),
        low: low_index.len(),
        dimensions: backend.dimensions(),
    })
}
