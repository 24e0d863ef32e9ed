//! Classifier adapter: memoised model handle plus thresholding.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{ClassifierError, LabelPrediction, ModelLoader, ToxicityModel};
use crate::result::{AiDetection, CategoryScore};

/// Default confidence threshold.
pub const DEFAULT_THRESHOLD: f32 = 0.8;

/// Categories whose scores drive segment masking by default.
///
/// Categories such as `identity_attack` are left out since they fire on
/// non-profane text.
pub const DEFAULT_MASKING_LABELS: &[&str] = &["toxicity", "severe_toxicity", "obscene"];

/// Configuration for the classifier adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Whether enhanced filtering is enabled at all.
    pub enabled: bool,
    /// A category matches when its probability exceeds this value.
    pub threshold: f32,
    /// Labels considered by [`ClassifierAdapter::score`].
    pub masking_labels: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: DEFAULT_THRESHOLD,
            masking_labels: DEFAULT_MASKING_LABELS
                .iter()
                .map(|l| l.to_string())
                .collect(),
        }
    }
}

/// Availability of the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierStatus {
    /// `load()` has not completed yet.
    NotLoaded,
    /// The model is loaded.
    Ready,
    /// Loading failed; enhanced filtering is off for this session.
    Unavailable,
}

/// Outcome of the one-time model acquisition.
type LoadOutcome = Result<Arc<dyn ToxicityModel>, String>;

/// Wraps a [`ToxicityModel`] behind an acquire-once handle.
///
/// Construct one per process or session and share it as
/// `Arc<ClassifierAdapter>`. The first completed [`load`](Self::load) wins;
/// concurrent callers wait for it and receive the same instance. A failed
/// acquisition is remembered and never retried.
pub struct ClassifierAdapter {
    loader: Box<dyn ModelLoader>,
    model: OnceCell<LoadOutcome>,
    config: ClassifierConfig,
}

impl std::fmt::Debug for ClassifierAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierAdapter")
            .field("loader", &self.loader.name())
            .field("status", &self.status())
            .field("config", &self.config)
            .finish()
    }
}

impl ClassifierAdapter {
    /// Creates an adapter. Nothing is loaded until first use.
    pub fn new(loader: Box<dyn ModelLoader>, mut config: ClassifierConfig) -> Self {
        config.threshold = config.threshold.clamp(0.0, 1.0);
        Self {
            loader,
            model: OnceCell::new(),
            config,
        }
    }

    /// Creates an adapter with the default configuration.
    pub fn with_defaults(loader: Box<dyn ModelLoader>) -> Self {
        Self::new(loader, ClassifierConfig::default())
    }

    /// Returns the configured threshold.
    pub fn threshold(&self) -> f32 {
        self.config.threshold
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Returns the current availability.
    pub fn status(&self) -> ClassifierStatus {
        match self.model.get() {
            None => ClassifierStatus::NotLoaded,
            Some(Ok(_)) => ClassifierStatus::Ready,
            Some(Err(_)) => ClassifierStatus::Unavailable,
        }
    }

    /// Returns true if the model has been loaded successfully.
    pub fn is_ready(&self) -> bool {
        self.status() == ClassifierStatus::Ready
    }

    /// Acquires the model, or returns the memoised outcome of an earlier
    /// acquisition.
    pub async fn load(&self) -> Result<Arc<dyn ToxicityModel>, ClassifierError> {
        let outcome = self
            .model
            .get_or_init(|| async {
                info!("Loading toxicity model via {} loader", self.loader.name());
                match self.loader.load().await {
                    Ok(model) => {
                        info!("Toxicity model {} loaded", model.name());
                        Ok(model)
                    }
                    Err(e) => {
                        warn!("Toxicity model unavailable, enhanced filtering disabled: {}", e);
                        Err(e.to_string())
                    }
                }
            })
            .await;

        match outcome {
            Ok(model) => Ok(Arc::clone(model)),
            Err(reason) => Err(ClassifierError::ModelUnavailable(reason.clone())),
        }
    }

    /// Like [`load`](Self::load), but the acquisition runs on its own task.
    ///
    /// Dropping the returned future stops the wait only. The acquisition
    /// keeps running and later callers get its outcome, so a caller-side
    /// timeout cannot cancel a slow load and restart it on the next call.
    pub async fn load_detached(
        self: &Arc<Self>,
    ) -> Result<Arc<dyn ToxicityModel>, ClassifierError> {
        if self.model.initialized() {
            return self.load().await;
        }

        let adapter = Arc::clone(self);
        match tokio::spawn(async move { adapter.load().await }).await {
            Ok(outcome) => outcome,
            Err(e) => Err(ClassifierError::ModelUnavailable(format!(
                "model load task failed: {}",
                e
            ))),
        }
    }

    /// Drops the loaded model so it can be reacquired on next use.
    pub fn unload(&mut self) {
        if self.model.take().is_some() {
            info!("Toxicity model unloaded");
        }
    }

    /// Classifies the whole text, surfacing failures.
    ///
    /// Empty or whitespace-only text returns an empty detection without
    /// touching the model.
    pub async fn try_detect(&self, text: &str) -> Result<AiDetection, ClassifierError> {
        if text.trim().is_empty() {
            return Ok(AiDetection::default());
        }

        let model = self.load().await?;
        let predictions = model.classify(text).await?;
        Ok(self.to_detection(predictions))
    }

    /// Classifies the whole text. Failures yield an empty detection.
    pub async fn detect(&self, text: &str) -> AiDetection {
        match self.try_detect(text).await {
            Ok(detection) => detection,
            Err(e) => {
                warn!("Classifier detection failed: {}", e);
                AiDetection::default()
            }
        }
    }

    /// Maximum positive probability across the masking labels.
    ///
    /// Failures score 0.0, which never exceeds the threshold.
    pub async fn score(&self, segment: &str) -> f32 {
        if segment.trim().is_empty() {
            return 0.0;
        }

        let predictions = match self.load().await {
            Ok(model) => model.classify(segment).await,
            Err(e) => Err(e),
        };

        match predictions {
            Ok(predictions) => self.masking_score(&predictions),
            Err(e) => {
                debug!(segment_len = segment.len(), "Segment scoring failed: {}", e);
                0.0
            }
        }
    }

    /// Returns true if `probability` exceeds the threshold.
    pub fn exceeds_threshold(&self, probability: f32) -> bool {
        probability > self.config.threshold
    }

    fn to_detection(&self, predictions: Vec<LabelPrediction>) -> AiDetection {
        let categories = predictions
            .into_iter()
            .map(|p| {
                let probability = p.positive().clamp(0.0, 1.0);
                CategoryScore {
                    is_match: self.exceeds_threshold(probability),
                    label: p.label,
                    probability,
                }
            })
            .collect();

        AiDetection::from_categories(categories)
    }

    fn masking_score(&self, predictions: &[LabelPrediction]) -> f32 {
        predictions
            .iter()
            .filter(|p| self.config.masking_labels.iter().any(|l| *l == p.label))
            .map(|p| p.positive().clamp(0.0, 1.0))
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::classifier::testing::{CountingLoader, FailingLoader, ScriptedModel};
    use crate::classifier::SharedModelLoader;

    const LABELS: &[&str] = &["toxicity", "identity_attack", "obscene"];

    fn adapter(model: ScriptedModel) -> ClassifierAdapter {
        ClassifierAdapter::with_defaults(Box::new(SharedModelLoader::new(Arc::new(model))))
    }

    #[test]
    fn config_defaults() {
        let config = ClassifierConfig::default();
        assert!(config.enabled);
        assert_eq!(config.threshold, 0.8);
        assert!(config.masking_labels.contains(&"toxicity".to_string()));
        assert!(config.masking_labels.contains(&"obscene".to_string()));
        assert!(!config.masking_labels.contains(&"identity_attack".to_string()));
    }

    #[test]
    fn threshold_is_clamped() {
        let config = ClassifierConfig {
            threshold: 1.7,
            ..Default::default()
        };
        let adapter = ClassifierAdapter::new(Box::new(FailingLoader), config);
        assert_eq!(adapter.threshold(), 1.0);
    }

    #[test]
    fn detect_maps_categories_against_threshold() {
        let model = ScriptedModel::new(LABELS).with("you jerk", &[0.85, 0.1, 0.3]);
        let detection = tokio_test::block_on(adapter(model).detect("you jerk"));

        assert!(detection.is_profane);
        assert_eq!(detection.categories.len(), 3);
        assert_eq!(detection.categories[0].label, "toxicity");
        assert!(detection.categories[0].is_match);
        assert!(!detection.categories[1].is_match);
        assert_eq!(detection.categories[2].probability, 0.3);
    }

    #[test]
    fn probability_equal_to_threshold_does_not_match() {
        let model = ScriptedModel::new(LABELS).with("edge", &[0.8, 0.0, 0.0]);
        let detection = tokio_test::block_on(adapter(model).detect("edge"));
        assert!(!detection.is_profane);
    }

    #[test]
    fn blank_text_skips_the_model() {
        let model = Arc::new(ScriptedModel::new(LABELS));
        let adapter =
            ClassifierAdapter::with_defaults(Box::new(SharedModelLoader::new(model.clone())));

        let detection = tokio_test::block_on(adapter.detect("   "));
        assert_eq!(detection, AiDetection::default());
        assert_eq!(model.calls(), 0);
        assert_eq!(adapter.status(), ClassifierStatus::NotLoaded);
    }

    #[test]
    fn classification_failure_is_swallowed() {
        let model = ScriptedModel::new(LABELS).failing_on("boom");
        let adapter = adapter(model);

        let detection = tokio_test::block_on(adapter.detect("boom"));
        assert!(!detection.is_profane);
        assert!(detection.categories.is_empty());

        let err = tokio_test::block_on(adapter.try_detect("boom")).unwrap_err();
        assert!(matches!(err, ClassifierError::ClassificationFailure(_)));
        assert_eq!(tokio_test::block_on(adapter.score("boom")), 0.0);
    }

    #[test]
    fn score_uses_only_masking_labels() {
        // identity_attack is high but not a masking label.
        let model = ScriptedModel::new(LABELS).with("group", &[0.2, 0.99, 0.4]);
        assert_eq!(tokio_test::block_on(adapter(model).score("group")), 0.4);
    }

    #[test]
    fn score_takes_max_of_masking_labels() {
        let model = ScriptedModel::new(LABELS).with("filth", &[0.6, 0.0, 0.95]);
        assert_eq!(tokio_test::block_on(adapter(model).score("filth")), 0.95);
    }

    #[test]
    fn failed_load_is_permanent() {
        let adapter = ClassifierAdapter::with_defaults(Box::new(FailingLoader));

        let err = tokio_test::block_on(adapter.load()).err().unwrap();
        assert!(matches!(err, ClassifierError::ModelUnavailable(_)));
        assert_eq!(adapter.status(), ClassifierStatus::Unavailable);

        let detection = tokio_test::block_on(adapter.detect("some text"));
        assert!(!detection.is_profane);
        assert_eq!(tokio_test::block_on(adapter.score("some text")), 0.0);
        assert!(matches!(
            tokio_test::block_on(adapter.try_detect("some text")),
            Err(ClassifierError::ModelUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_loads_acquire_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let loader = CountingLoader {
            model: Arc::new(ScriptedModel::new(LABELS)),
            loads: loads.clone(),
            delay: Duration::from_millis(20),
        };
        let adapter = Arc::new(ClassifierAdapter::with_defaults(Box::new(loader)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let adapter = adapter.clone();
                tokio::spawn(async move { adapter.load().await })
            })
            .collect();

        let mut models = Vec::new();
        for handle in handles {
            models.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(models.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert!(adapter.is_ready());
    }

    #[tokio::test]
    async fn abandoned_detached_load_still_completes() {
        let loads = Arc::new(AtomicUsize::new(0));
        let loader = CountingLoader {
            model: Arc::new(ScriptedModel::new(LABELS)),
            loads: loads.clone(),
            delay: Duration::from_millis(60),
        };
        let adapter = Arc::new(ClassifierAdapter::with_defaults(Box::new(loader)));

        for _ in 0..3 {
            let waited =
                tokio::time::timeout(Duration::from_millis(5), adapter.load_detached()).await;
            assert!(waited.is_err());
        }

        let model = tokio::time::timeout(Duration::from_secs(5), adapter.load_detached())
            .await
            .unwrap();
        assert!(model.is_ok());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(adapter.is_ready());
    }

    #[tokio::test]
    async fn unload_allows_reacquisition() {
        let loads = Arc::new(AtomicUsize::new(0));
        let loader = CountingLoader {
            model: Arc::new(ScriptedModel::new(LABELS)),
            loads: loads.clone(),
            delay: Duration::from_millis(1),
        };
        let mut adapter = ClassifierAdapter::with_defaults(Box::new(loader));

        adapter.load().await.unwrap();
        adapter.unload();
        assert_eq!(adapter.status(), ClassifierStatus::NotLoaded);

        adapter.load().await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }
}
