//! Topic classifier — local sequence classification via ONNX Runtime
//!
//! Uses the `ort` crate for inference and `tokenizers` for preprocessing.
//! The model is the fine-tuned counseling-topic classifier exported to ONNX;
//! its HF `config.json` supplies the `id2label` table.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use serde::Deserialize;
use thiserror::Error;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};

use crate::config::{expand_path, ClassifierConfig};

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Classifier file not found at {path}")]
    ModelNotFound { path: String },

    #[error("ONNX inference error: {0}")]
    Inference(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Invalid model config: {0}")]
    Config(String),

    #[error("Model produced no usable logits")]
    EmptyLogits,

    #[error("Predicted index {index} outside label set of {labels}")]
    LabelOutOfRange { index: usize, labels: usize },
}

/// Result of one forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    pub index: usize,
    pub logits: Vec<f32>,
}

/// Abstraction over sequence classifiers.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifierError>;

    /// The fixed label set, ordered by class index.
    fn labels(&self) -> &[String];
}

/// Index of the highest logit. Ties go to the lowest index; NaN never wins.
pub fn argmax(logits: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in logits.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Map logits to a label from `labels` via [`argmax`].
pub fn select_label(labels: &[String], logits: Vec<f32>) -> Result<Classification, ClassifierError> {
    let index = argmax(&logits).ok_or(ClassifierError::EmptyLogits)?;
    let label = labels
        .get(index)
        .cloned()
        .ok_or(ClassifierError::LabelOutOfRange {
            index,
            labels: labels.len(),
        })?;
    Ok(Classification {
        label,
        index,
        logits,
    })
}

#[derive(Debug, Deserialize)]
struct ModelConfig {
    id2label: HashMap<String, String>,
}

/// Read `id2label` from an HF `config.json` into an index-ordered list.
pub fn load_labels(config_path: &Path) -> Result<Vec<String>, ClassifierError> {
    let raw = std::fs::read_to_string(config_path).map_err(|_| ClassifierError::ModelNotFound {
        path: config_path.display().to_string(),
    })?;
    parse_labels(&raw)
}

fn parse_labels(raw: &str) -> Result<Vec<String>, ClassifierError> {
    let config: ModelConfig =
        serde_json::from_str(raw).map_err(|e| ClassifierError::Config(e.to_string()))?;

    let mut labels = vec![None; config.id2label.len()];
    for (id, label) in config.id2label {
        let idx: usize = id
            .parse()
            .map_err(|_| ClassifierError::Config(format!("non-numeric label id {id:?}")))?;
        let slot = labels
            .get_mut(idx)
            .ok_or_else(|| ClassifierError::Config(format!("label id {idx} is not contiguous")))?;
        *slot = Some(label);
    }

    let labels: Vec<String> = labels.into_iter().flatten().collect();
    if labels.is_empty() {
        return Err(ClassifierError::Config("id2label is empty".to_string()));
    }
    Ok(labels)
}

/// Local ONNX sequence classifier.
pub struct OnnxClassifier {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    labels: Vec<String>,
    token_type_ids: bool,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

impl OnnxClassifier {
    /// Load the ONNX model, tokenizer and label table named in `config`.
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let model_path = expand_path(&config.model_path);
        let tokenizer_path = expand_path(&config.tokenizer_path);
        let config_path = expand_path(&config.config_path);

        for path in [&model_path, &tokenizer_path, &config_path] {
            ensure_exists(path)?;
        }

        let labels = load_labels(&config_path)?;

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(&model_path))
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ClassifierError::Tokenizer(e.to_string()))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..Default::default()
            }))
            .map_err(|e| ClassifierError::Tokenizer(e.to_string()))?;
        tokenizer.with_padding(Some(PaddingParams::default()));

        tracing::info!(
            model = %model_path.display(),
            labels = labels.len(),
            "Loaded topic classifier"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            labels,
            token_type_ids: config.token_type_ids,
        })
    }
}

fn ensure_exists(path: &Path) -> Result<(), ClassifierError> {
    if path.exists() {
        Ok(())
    } else {
        Err(ClassifierError::ModelNotFound {
            path: path.display().to_string(),
        })
    }
}

#[async_trait]
impl TextClassifier for OnnxClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifierError> {
        // Inference is CPU-bound — run on the blocking thread pool.
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let token_type_ids = self.token_type_ids;
        let text = text.to_string();

        let logits = tokio::task::spawn_blocking(move || {
            let mut session_guard = session
                .lock()
                .map_err(|e| ClassifierError::Inference(format!("session lock poisoned: {e}")))?;
            logits_sync(&mut session_guard, &tokenizer, &text, token_type_ids)
        })
        .await
        .map_err(|e| ClassifierError::Inference(format!("spawn_blocking join error: {e}")))??;

        select_label(&self.labels, logits)
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Tokenize and run one forward pass, returning the `[num_labels]` logits row.
fn logits_sync(
    session: &mut Session,
    tokenizer: &Tokenizer,
    text: &str,
    token_type_ids: bool,
) -> Result<Vec<f32>, ClassifierError> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| ClassifierError::Tokenizer(e.to_string()))?;

    let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
    let attention_mask: Vec<i64> = encoding
        .get_attention_mask()
        .iter()
        .map(|&m| m as i64)
        .collect();
    let type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();

    let shape = vec![1i64, input_ids.len() as i64];

    let input_ids_tensor = Tensor::from_array((shape.clone(), input_ids))
        .map_err(|e| ClassifierError::Inference(e.to_string()))?;
    let attention_mask_tensor = Tensor::from_array((shape.clone(), attention_mask))
        .map_err(|e| ClassifierError::Inference(e.to_string()))?;

    let outputs = if token_type_ids {
        let type_ids_tensor = Tensor::from_array((shape, type_ids))
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        session.run(ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
            "token_type_ids" => type_ids_tensor,
        })
    } else {
        session.run(ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
        })
    }
    .map_err(|e| ClassifierError::Inference(e.to_string()))?;

    // Expected shape: [1, num_labels]
    let (out_shape, data) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| ClassifierError::Inference(e.to_string()))?;

    if out_shape.len() != 2 || out_shape[0] != 1 {
        return Err(ClassifierError::Inference(format!(
            "Expected [1, num_labels] logits, got {:?}",
            &out_shape[..]
        )));
    }

    Ok(data.to_vec())
}
