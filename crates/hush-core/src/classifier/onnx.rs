//! Local ONNX toxicity model.
//!
//! Runs a multi-label BERT-style toxicity model (one logit per label) through
//! ONNX Runtime. Each logit goes through a sigmoid to give the positive-class
//! probability. Inference runs on a blocking thread.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ClassifierError, LabelPrediction, ModelLoader, ToxicityModel};
use crate::model_downloader::ModelDownloader;

/// Labels emitted by the default model, in output order.
pub const DEFAULT_LABELS: &[&str] = &[
    "toxicity",
    "severe_toxicity",
    "obscene",
    "threat",
    "insult",
    "identity_attack",
];

/// Configuration for the ONNX toxicity model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnnxModelConfig {
    /// Path to the ONNX model file.
    pub model_path: String,
    /// Path to the tokenizer.json file.
    pub tokenizer_path: String,
    /// Maximum sequence length (tokens).
    pub max_length: usize,
    /// Label for each output logit, in order.
    pub labels: Vec<String>,
}

impl Default for OnnxModelConfig {
    fn default() -> Self {
        Self {
            model_path: "models/toxicity.onnx".to_string(),
            tokenizer_path: "models/toxicity_tokenizer.json".to_string(),
            max_length: 512,
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl OnnxModelConfig {
    /// Creates a config pointing at the files managed by [`ModelDownloader`].
    pub fn from_downloader() -> Option<Self> {
        let downloader = ModelDownloader::new()?;
        Some(Self {
            model_path: downloader.model_path().to_string_lossy().to_string(),
            tokenizer_path: downloader.tokenizer_path().to_string_lossy().to_string(),
            ..Default::default()
        })
    }
}

/// Logistic function.
#[cfg_attr(not(feature = "ml"), allow(dead_code))]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(feature = "ml")]
struct OnnxSession {
    session: ort::session::Session,
    tokenizer: tokenizers::Tokenizer,
    config: OnnxModelConfig,
}

#[cfg(feature = "ml")]
fn failure(context: &str, e: impl std::fmt::Display) -> ClassifierError {
    ClassifierError::ClassificationFailure(format!("{}: {}", context, e))
}

#[cfg(feature = "ml")]
fn unavailable(e: impl std::fmt::Display) -> ClassifierError {
    ClassifierError::ModelUnavailable(e.to_string())
}

#[cfg(feature = "ml")]
impl OnnxSession {
    fn open(config: OnnxModelConfig) -> Result<Self, ClassifierError> {
        use std::path::Path;

        use ort::session::{builder::GraphOptimizationLevel, Session};

        if !Path::new(&config.model_path).exists() {
            return Err(ClassifierError::ModelUnavailable(format!(
                "model file not found: {}",
                config.model_path
            )));
        }
        if !Path::new(&config.tokenizer_path).exists() {
            return Err(ClassifierError::ModelUnavailable(format!(
                "tokenizer file not found: {}",
                config.tokenizer_path
            )));
        }

        let session = Session::builder()
            .map_err(unavailable)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(unavailable)?
            .with_intra_threads(1)
            .map_err(unavailable)?
            .commit_from_file(&config.model_path)
            .map_err(unavailable)?;

        let tokenizer =
            tokenizers::Tokenizer::from_file(&config.tokenizer_path).map_err(unavailable)?;

        Ok(Self {
            session,
            tokenizer,
            config,
        })
    }

    fn infer(&mut self, text: &str) -> Result<Vec<LabelPrediction>, ClassifierError> {
        use ort::value::Tensor;

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| failure("tokenizer", e))?;

        let seq_len = encoding.get_ids().len().min(self.config.max_length);
        let input_ids: Vec<i64> = encoding.get_ids()[..seq_len]
            .iter()
            .map(|&id| id as i64)
            .collect();
        let attention_mask: Vec<i64> = encoding.get_attention_mask()[..seq_len]
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids = vec![0i64; seq_len];

        let input_ids = Tensor::from_array(([1, seq_len], input_ids.into_boxed_slice()))
            .map_err(|e| failure("input_ids", e))?;
        let attention_mask = Tensor::from_array(([1, seq_len], attention_mask.into_boxed_slice()))
            .map_err(|e| failure("attention_mask", e))?;
        let token_type_ids = Tensor::from_array(([1, seq_len], token_type_ids.into_boxed_slice()))
            .map_err(|e| failure("token_type_ids", e))?;

        let outputs = self
            .session
            .run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids
            ])
            .map_err(|e| failure("inference", e))?;

        let (shape, logits) = outputs["logits"]
            .try_extract_tensor::<f32>()
            .map_err(|e| failure("logits", e))?;

        let dims: Vec<i64> = shape.iter().copied().collect();
        let labels = &self.config.labels;
        if dims.len() != 2 || dims[0] != 1 || dims[1] as usize != labels.len() {
            return Err(ClassifierError::ClassificationFailure(format!(
                "unexpected output shape {:?} for {} labels",
                dims,
                labels.len()
            )));
        }

        Ok(labels
            .iter()
            .zip(logits.iter())
            .map(|(label, &logit)| LabelPrediction::new(label.clone(), sigmoid(logit)))
            .collect())
    }
}

/// ONNX-backed [`ToxicityModel`].
#[cfg(feature = "ml")]
pub struct OnnxToxicityModel {
    inner: Arc<parking_lot::Mutex<OnnxSession>>,
}

#[cfg(feature = "ml")]
impl OnnxToxicityModel {
    /// Loads the model and tokenizer. Blocking.
    pub fn new(config: OnnxModelConfig) -> Result<Self, ClassifierError> {
        let session = OnnxSession::open(config)?;
        Ok(Self {
            inner: Arc::new(parking_lot::Mutex::new(session)),
        })
    }
}

#[cfg(feature = "ml")]
#[async_trait]
impl ToxicityModel for OnnxToxicityModel {
    async fn classify(&self, text: &str) -> Result<Vec<LabelPrediction>, ClassifierError> {
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();

        tokio::task::spawn_blocking(move || inner.lock().infer(&text))
            .await
            .map_err(|e| failure("inference task", e))?
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

/// Stub model when the ML feature is not enabled.
#[cfg(not(feature = "ml"))]
pub struct OnnxToxicityModel {
    _config: OnnxModelConfig,
}

#[cfg(not(feature = "ml"))]
impl OnnxToxicityModel {
    /// Always fails: ML feature not enabled.
    pub fn new(_config: OnnxModelConfig) -> Result<Self, ClassifierError> {
        Err(ClassifierError::MlNotEnabled)
    }
}

#[cfg(not(feature = "ml"))]
#[async_trait]
impl ToxicityModel for OnnxToxicityModel {
    async fn classify(&self, _text: &str) -> Result<Vec<LabelPrediction>, ClassifierError> {
        Err(ClassifierError::MlNotEnabled)
    }

    fn name(&self) -> &'static str {
        "onnx-disabled"
    }
}

/// Loads an [`OnnxToxicityModel`] on a blocking thread.
#[derive(Debug, Clone)]
pub struct OnnxModelLoader {
    config: OnnxModelConfig,
}

impl OnnxModelLoader {
    /// Creates a loader for the given model files.
    pub fn new(config: OnnxModelConfig) -> Self {
        Self { config }
    }

    /// Returns the model configuration.
    pub fn config(&self) -> &OnnxModelConfig {
        &self.config
    }
}

#[async_trait]
impl ModelLoader for OnnxModelLoader {
    async fn load(&self) -> Result<Arc<dyn ToxicityModel>, ClassifierError> {
        if let Some(downloader) = ModelDownloader::new() {
            downloader.setup_environment();
        }

        let config = self.config.clone();
        let model = tokio::task::spawn_blocking(move || OnnxToxicityModel::new(config))
            .await
            .map_err(|e| ClassifierError::ModelUnavailable(e.to_string()))?
            .map_err(|e| match e {
                ClassifierError::ModelUnavailable(_) => e,
                other => ClassifierError::ModelUnavailable(other.to_string()),
            })?;

        Ok(Arc::new(model))
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}
