//! End-to-end ingest runs against an in-memory embedding backend.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use counsel_core::vector_index::{HIGH_INDEX_FILE, HIGH_TEXTS_FILE, LOW_INDEX_FILE, LOW_TEXTS_FILE};
use counsel_core::{EmbeddingBackend, EmbeddingError, ExampleStore, FlatIndex};
use counsel_ingest::{build_tier, run, IngestError, IngestOptions, RetryPolicy};

/// Embeds a text as `[len, vowel count]`.
struct LengthEmbedder;

#[async_trait]
impl EmbeddingBackend for LengthEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vowels = text.chars().filter(|c| "aeiou".contains(*c)).count();
        Ok(vec![text.len() as f32, vowels as f32])
    }

    fn dimensions(&self) -> usize {
        2
    }

    fn name(&self) -> &str {
        "length"
    }
}

/// Fails the first `failures` calls with a rate limit, then succeeds.
struct FlakyEmbedder {
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingBackend for FlakyEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(EmbeddingError::Api {
                code: 429,
                message: "rate limited".to_string(),
            });
        }
        Ok(vec![1.0, 1.0])
    }

    fn dimensions(&self) -> usize {
        2
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

fn fast_retry(max_retries: usize) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay_ms: 1,
    }
}

#[tokio::test]
async fn test_run_writes_loadable_indexes() {
    let transcripts = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::write(transcripts.path().join("high_001.txt"), "counselor: tell me more").unwrap();
    fs::write(transcripts.path().join("high_002.txt"), "counselor: that sounds hard").unwrap();
    fs::write(transcripts.path().join("low_001.txt"), "counselor: calm down").unwrap();

    let options = IngestOptions {
        transcripts_dir: transcripts.path().to_path_buf(),
        output_dir: output.path().join("conversation_embeddings"),
        retry: fast_retry(0),
    };
    let summary = run(&options, &LengthEmbedder).await.unwrap();
    assert_eq!(summary.high, 2);
    assert_eq!(summary.low, 1);
    assert_eq!(summary.dimensions, 2);

    for file in [HIGH_INDEX_FILE, LOW_INDEX_FILE, HIGH_TEXTS_FILE, LOW_TEXTS_FILE] {
        assert!(options.output_dir.join(file).exists(), "{file} missing");
    }

    let texts = fs::read_to_string(options.output_dir.join(HIGH_TEXTS_FILE)).unwrap();
    assert!(texts.starts_with("[\n  \"counselor: tell me more\""), "got: {texts}");

    let store = ExampleStore::load(&options.output_dir).unwrap();
    let query = LengthEmbedder.embed("counselor: tell me more").await.unwrap();
    let matches = store.search(&query, 1).unwrap();
    assert_eq!(matches.high_quality, vec!["counselor: tell me more".to_string()]);
    assert_eq!(matches.low_quality, vec!["counselor: calm down".to_string()]);
}

#[tokio::test]
async fn test_build_tier_retries_transient_failures() {
    let backend = FlakyEmbedder {
        failures: 2,
        calls: AtomicUsize::new(0),
    };
    let texts = vec!["only one".to_string()];

    let index: FlatIndex = build_tier(&texts, &backend, fast_retry(3)).await.unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_build_tier_gives_up_after_retries() {
    let backend = FlakyEmbedder {
        failures: usize::MAX,
        calls: AtomicUsize::new(0),
    };
    let texts = vec!["a".to_string(), "b".to_string()];

    let err = build_tier(&texts, &backend, fast_retry(2)).await.unwrap_err();
    match err {
        IngestError::Embedding {
            position, attempts, ..
        } => {
            assert_eq!(position, 0);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected embedding error, got {other:?}"),
    }
    assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
}
