//! Probabilistic toxicity classification.
//!
//! The core only depends on the [`ToxicityModel`] capability: given a text it
//! returns, per category, the probabilities of the negative and positive
//! class. [`ClassifierAdapter`] wraps a model behind a memoised loader, maps
//! raw predictions to thresholded [`CategoryScore`]s and never lets a
//! backend failure escape.
//!
//! Backends:
//! - [`OnnxModelLoader`]: local ONNX model (requires the `ml` feature).
//! - [`SharedModelLoader`]: an already constructed model, e.g. a remote
//!   scorer owned by the embedding application.

mod adapter;
mod onnx;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use adapter::{ClassifierAdapter, ClassifierConfig, ClassifierStatus};
pub use onnx::{OnnxModelConfig, OnnxModelLoader, OnnxToxicityModel};

pub use crate::error::ClassifierError;
pub use crate::result::{AiDetection, CategoryScore};

/// Raw prediction for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelPrediction {
    /// Category label, e.g. `toxicity` or `obscene`.
    pub label: String,
    /// `[P(negative), P(positive)]`.
    pub probabilities: [f32; 2],
}

impl LabelPrediction {
    /// Creates a prediction from the positive-class probability.
    pub fn new(label: impl Into<String>, positive: f32) -> Self {
        let positive = positive.clamp(0.0, 1.0);
        Self {
            label: label.into(),
            probabilities: [1.0 - positive, positive],
        }
    }

    /// Probability of the positive class.
    pub fn positive(&self) -> f32 {
        self.probabilities[1]
    }
}

/// The scoring capability consumed by the adapter.
#[async_trait]
pub trait ToxicityModel: Send + Sync {
    /// Scores `text`, returning one prediction per category in model order.
    async fn classify(&self, text: &str) -> Result<Vec<LabelPrediction>, ClassifierError>;

    /// Returns the name of this model for logging.
    fn name(&self) -> &'static str;
}

/// Acquires a [`ToxicityModel`]. Called at most once per adapter.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Loads the model. May be slow (disk or network bound).
    async fn load(&self) -> Result<Arc<dyn ToxicityModel>, ClassifierError>;

    /// Returns the name of this loader for logging.
    fn name(&self) -> &'static str;
}

/// Loader that hands out a model constructed elsewhere.
pub struct SharedModelLoader {
    model: Arc<dyn ToxicityModel>,
}

impl SharedModelLoader {
    /// Wraps an existing model.
    pub fn new(model: Arc<dyn ToxicityModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl ModelLoader for SharedModelLoader {
    async fn load(&self) -> Result<Arc<dyn ToxicityModel>, ClassifierError> {
        Ok(Arc::clone(&self.model))
    }

    fn name(&self) -> &'static str {
        "shared"
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted models and loaders for tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Model answering from a table keyed by exact text.
    ///
    /// Unknown texts score 0.1 on every label.
    pub struct ScriptedModel {
        pub labels: Vec<&'static str>,
        pub scores: HashMap<String, Vec<f32>>,
        pub fail_on: Vec<String>,
        pub calls: AtomicUsize,
    }

    impl ScriptedModel {
        pub fn new(labels: &[&'static str]) -> Self {
            Self {
                labels: labels.to_vec(),
                scores: HashMap::new(),
                fail_on: Vec::new(),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with(mut self, text: &str, scores: &[f32]) -> Self {
            self.scores.insert(text.to_string(), scores.to_vec());
            self
        }

        pub fn failing_on(mut self, text: &str) -> Self {
            self.fail_on.push(text.to_string());
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ToxicityModel for ScriptedModel {
        async fn classify(&self, text: &str) -> Result<Vec<LabelPrediction>, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.iter().any(|t| t == text) {
                return Err(ClassifierError::ClassificationFailure(
                    "scripted failure".to_string(),
                ));
            }

            let scores = self
                .scores
                .get(text)
                .cloned()
                .unwrap_or_else(|| vec![0.1; self.labels.len()]);

            Ok(self
                .labels
                .iter()
                .zip(scores)
                .map(|(label, p)| LabelPrediction::new(*label, p))
                .collect())
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    /// Loader that always fails.
    pub struct FailingLoader;

    #[async_trait]
    impl ModelLoader for FailingLoader {
        async fn load(&self) -> Result<Arc<dyn ToxicityModel>, ClassifierError> {
            Err(ClassifierError::ModelUnavailable("no model here".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    /// Loader that counts acquisitions and sleeps before returning.
    pub struct CountingLoader {
        pub model: Arc<dyn ToxicityModel>,
        pub loads: Arc<AtomicUsize>,
        pub delay: Duration,
    }

    #[async_trait]
    impl ModelLoader for CountingLoader {
        async fn load(&self) -> Result<Arc<dyn ToxicityModel>, ClassifierError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(Arc::clone(&self.model))
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }
}
