//! Fusion of the dictionary matcher and the classifier.
//!
//! The dictionary pass always runs and its result is the floor: the
//! classifier can only add masking on top of it, and any classifier failure
//! degrades to the dictionary-only result.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::classifier::{ClassifierAdapter, ClassifierStatus, OnnxModelLoader};
use crate::config::HushConfig;
use crate::error::ConfigError;
use crate::mask::{is_masked_token, mask_ranges};
use crate::matcher::DictionaryMatcher;
use crate::result::{push_unique, FilterResult, HighlightResult, MatchSource};
use crate::segments::extract_segments;

/// A segment retained for masking.
#[derive(Debug, Clone)]
struct Flagged<'a> {
    text: &'a str,
    score: f32,
}

/// Combines the dictionary matcher with an optional shared classifier.
#[derive(Debug, Clone)]
pub struct FusionEngine {
    matcher: Arc<DictionaryMatcher>,
    classifier: Option<Arc<ClassifierAdapter>>,
}

impl FusionEngine {
    /// Creates an engine. Without a classifier, enhanced filtering is the
    /// dictionary-only path.
    pub fn new(matcher: Arc<DictionaryMatcher>, classifier: Option<Arc<ClassifierAdapter>>) -> Self {
        Self {
            matcher,
            classifier,
        }
    }

    /// Builds the engine described by `config`.
    ///
    /// The classifier is created but not loaded; the first enhanced call
    /// loads it.
    pub fn from_config(config: &HushConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let lexicon = config.build_lexicon()?;
        let matcher = DictionaryMatcher::with_mask(lexicon, config.mask_char)?;

        let classifier = if config.classifier.enabled {
            let loader = OnnxModelLoader::new(config.model.clone());
            Some(Arc::new(ClassifierAdapter::new(
                Box::new(loader),
                config.classifier.clone(),
            )))
        } else {
            None
        };

        Ok(Self::new(Arc::new(matcher), classifier))
    }

    /// The dictionary matcher.
    pub fn matcher(&self) -> &Arc<DictionaryMatcher> {
        &self.matcher
    }

    /// The classifier, if enhanced filtering is configured.
    pub fn classifier(&self) -> Option<&Arc<ClassifierAdapter>> {
        self.classifier.as_ref()
    }

    /// Availability of enhanced filtering. `None` if no classifier is
    /// configured.
    pub fn classifier_status(&self) -> Option<ClassifierStatus> {
        self.classifier.as_ref().map(|c| c.status())
    }

    /// Dictionary-only filtering.
    pub fn filter(&self, text: &str) -> FilterResult {
        self.matcher.scan(text)
    }

    /// Reports lexicon occurrences without masking.
    pub fn highlight(&self, text: &str) -> HighlightResult {
        self.matcher.highlight(text)
    }

    /// Dictionary filtering plus classifier-driven segment masking.
    ///
    /// Never fails: if the classifier is missing, unavailable or errors on the
    /// whole-text detection, the dictionary result is returned with no
    /// `ai_detection`.
    pub async fn enhanced_filter(&self, text: &str) -> FilterResult {
        if text.is_empty() {
            return FilterResult::empty();
        }

        let wordlist = self.matcher.scan(text);

        let Some(classifier) = &self.classifier else {
            return wordlist;
        };

        if !text.trim().is_empty() {
            if let Err(e) = classifier.load_detached().await {
                warn!("Enhanced filtering degraded to dictionary only: {}", e);
                return wordlist;
            }
        }

        let detection = match classifier.try_detect(text).await {
            Ok(detection) => detection,
            Err(e) => {
                warn!("Enhanced filtering degraded to dictionary only: {}", e);
                return wordlist;
            }
        };

        if !detection.is_profane {
            return FilterResult {
                ai_detection: Some(detection),
                ..wordlist
            };
        }

        let FilterResult {
            filtered_text,
            was_filtered,
            mut matches,
            mut spans,
            ..
        } = wordlist;

        let flagged = self.flag_segments(classifier, &filtered_text).await;
        debug!(segments = flagged.len(), "Classifier flagged segments");

        let mut seen: HashSet<String> = matches.iter().cloned().collect();
        let mask = self.matcher.mask_char();
        let mut current = filtered_text.clone();

        for segment in &flagged {
            let ranges = whole_occurrences(&current, segment.text);
            if ranges.is_empty() {
                continue;
            }

            let term = segment.text.to_lowercase();
            current = mask_ranges(
                &current,
                ranges,
                mask,
                &term,
                MatchSource::Classifier,
                &mut spans,
            );
            push_unique(&mut matches, &mut seen, &term);
        }

        spans.sort_by_key(|s| s.start);

        FilterResult {
            filtered_text: current,
            was_filtered: was_filtered || detection.is_profane,
            matches,
            ai_detection: Some(detection),
            spans,
        }
    }

    /// Scores the segments of the dictionary-masked text and returns those
    /// above the threshold, longest first.
    async fn flag_segments<'a>(
        &self,
        classifier: &ClassifierAdapter,
        masked: &'a str,
    ) -> Vec<Flagged<'a>> {
        let mask = self.matcher.mask_char();
        let mut scored = Vec::new();

        for segment in extract_segments(masked) {
            if segment.words().any(|w| is_masked_token(w, mask)) {
                continue;
            }
            let score = classifier.score(segment.text).await;
            scored.push(Flagged {
                text: segment.text,
                score,
            });
        }

        let mut seen = HashSet::new();
        let mut flagged: Vec<Flagged<'a>> = scored
            .into_iter()
            .filter(|s| seen.insert(s.text))
            .filter(|s| classifier.exceeds_threshold(s.score))
            .collect();

        // Both sorts are stable: ties keep extraction order.
        flagged.sort_by(|a, b| b.score.total_cmp(&a.score));
        flagged.sort_by(|a, b| b.text.chars().count().cmp(&a.text.chars().count()));
        flagged
    }
}

/// Byte ranges of `segment` in `text` that cover whole tokens, leftmost
/// first and non-overlapping. A token merely containing the segment's letters
/// is not an occurrence.
fn whole_occurrences(text: &str, segment: &str) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = Vec::new();

    for candidate in extract_segments(text).filter(|s| s.text == segment) {
        let range = candidate.range();
        if ranges.last().map_or(true, |last| last.end <= range.start) {
            ranges.push(range);
        }
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::testing::{FailingLoader, ScriptedModel};
    use crate::classifier::{ClassifierConfig, ModelLoader, SharedModelLoader};
    use crate::lexicon::Lexicon;

    const LABELS: &[&str] = &["toxicity", "severe_toxicity", "obscene", "identity_attack"];

    fn matcher(terms: &[&str]) -> Arc<DictionaryMatcher> {
        Arc::new(DictionaryMatcher::new(Arc::new(Lexicon::new(terms))).unwrap())
    }

    fn engine_with(terms: &[&str], loader: Box<dyn ModelLoader>) -> FusionEngine {
        let adapter = ClassifierAdapter::new(loader, ClassifierConfig::default());
        FusionEngine::new(matcher(terms), Some(Arc::new(adapter)))
    }

    fn scripted(terms: &[&str], model: ScriptedModel) -> (FusionEngine, Arc<ScriptedModel>) {
        let model = Arc::new(model);
        let engine = engine_with(terms, Box::new(SharedModelLoader::new(model.clone())));
        (engine, model)
    }

    #[tokio::test]
    async fn flagged_segment_is_masked_and_low_score_is_kept() {
        let text = "you are a meanie and nice";
        let (engine, _) = scripted(
            &["badword"],
            ScriptedModel::new(LABELS)
                .with(text, &[0.95, 0.1, 0.1, 0.1])
                .with("meanie", &[0.95, 0.2, 0.3, 0.0])
                .with("nice", &[0.5, 0.0, 0.0, 0.0]),
        );

        let result = engine.enhanced_filter(text).await;

        assert_eq!(result.filtered_text, "you are a ****** and nice");
        assert_eq!(result.matches, vec!["meanie"]);
        assert!(result.was_filtered);
        assert!(result.ai_flagged());
        assert_eq!(result.spans.len(), 1);
        assert_eq!(result.spans[0].source, MatchSource::Classifier);
        assert_eq!(result.spans[0].start, 10);
    }

    #[tokio::test]
    async fn dictionary_and_classifier_matches_are_merged() {
        let text = "damn you jerk";
        let (engine, model) = scripted(
            &["damn"],
            ScriptedModel::new(LABELS)
                .with(text, &[0.9, 0.0, 0.0, 0.0])
                .with("jerk", &[0.0, 0.0, 0.92, 0.0]),
        );

        let result = engine.enhanced_filter(text).await;

        assert_eq!(result.filtered_text, "**** you ****");
        assert_eq!(result.matches, vec!["damn", "jerk"]);
        assert_eq!(result.spans[0].source, MatchSource::Dictionary);
        assert_eq!(result.spans[1].source, MatchSource::Classifier);
        // Whole text plus "you", "you jerk" and "jerk"; segments touching the
        // masked word are never scored.
        assert_eq!(model.calls(), 4);
    }

    #[tokio::test]
    async fn longest_segment_is_masked_first() {
        let text = "well stupid jerk then";
        let (engine, _) = scripted(
            &[],
            ScriptedModel::new(LABELS)
                .with(text, &[0.9, 0.0, 0.0, 0.0])
                .with("stupid", &[0.99, 0.0, 0.0, 0.0])
                .with("stupid jerk", &[0.85, 0.0, 0.0, 0.0]),
        );

        let result = engine.enhanced_filter(text).await;

        assert_eq!(result.filtered_text, "well *********** then");
        assert_eq!(result.matches, vec!["stupid jerk"]);
        assert_eq!(result.spans.len(), 1);
        assert_eq!((result.spans[0].start, result.spans[0].len), (5, 11));
    }

    #[tokio::test]
    async fn repeated_segments_are_masked_once_per_occurrence() {
        let text = "go go away now";
        let (engine, _) = scripted(
            &[],
            ScriptedModel::new(LABELS)
                .with(text, &[0.9, 0.0, 0.0, 0.0])
                .with("go", &[0.9, 0.0, 0.0, 0.0]),
        );

        let result = engine.enhanced_filter(text).await;

        assert_eq!(result.filtered_text, "** ** away now");
        assert_eq!(result.matches, vec!["go"]);
        assert_eq!(result.spans.len(), 2);
    }

    #[tokio::test]
    async fn flagged_segment_inside_another_token_is_left_alone() {
        let text = "go ago now please";
        let (engine, _) = scripted(
            &[],
            ScriptedModel::new(LABELS)
                .with(text, &[0.9, 0.0, 0.0, 0.0])
                .with("go", &[0.9, 0.0, 0.0, 0.0]),
        );

        let result = engine.enhanced_filter(text).await;

        assert_eq!(result.filtered_text, "** ago now please");
        assert_eq!(result.matches, vec!["go"]);
        assert_eq!(result.spans.len(), 1);
        assert_eq!((result.spans[0].start, result.spans[0].len), (0, 2));
    }

    #[tokio::test]
    async fn flagged_bigram_occurrences_do_not_overlap() {
        let text = "no no no thanks";
        let (engine, _) = scripted(
            &[],
            ScriptedModel::new(LABELS)
                .with(text, &[0.9, 0.0, 0.0, 0.0])
                .with("no no no", &[0.2, 0.0, 0.0, 0.0])
                .with("no no", &[0.9, 0.0, 0.0, 0.0]),
        );

        let result = engine.enhanced_filter(text).await;

        assert_eq!(result.filtered_text, "***** no thanks");
        assert_eq!(result.spans.len(), 1);
    }

    #[test]
    fn whole_occurrences_respect_token_edges() {
        let text = "ass classic ass, ass";
        let ranges = whole_occurrences(text, "ass");
        assert_eq!(ranges, vec![0..3, 17..20]);
        assert_eq!(whole_occurrences(text, "ass,"), vec![12..16]);
        assert!(whole_occurrences(text, "lass").is_empty());
    }

    #[tokio::test]
    async fn segment_terms_are_case_folded() {
        let text = "What a Meanie indeed";
        let (engine, _) = scripted(
            &[],
            ScriptedModel::new(LABELS)
                .with(text, &[0.9, 0.0, 0.0, 0.0])
                .with("Meanie", &[0.9, 0.0, 0.0, 0.0]),
        );

        let result = engine.enhanced_filter(text).await;
        assert_eq!(result.filtered_text, "What a ****** indeed");
        assert_eq!(result.matches, vec!["meanie"]);
    }

    #[tokio::test]
    async fn profane_verdict_without_masking_still_filters() {
        let text = "those people over there";
        let (engine, _) = scripted(
            &[],
            ScriptedModel::new(LABELS)
                .with(text, &[0.1, 0.0, 0.0, 0.93])
                .with("those people", &[0.1, 0.0, 0.0, 0.95]),
        );

        let result = engine.enhanced_filter(text).await;

        assert_eq!(result.filtered_text, text);
        assert!(result.matches.is_empty());
        assert!(result.was_filtered);
        assert!(result.ai_flagged());
    }

    #[tokio::test]
    async fn clean_verdict_keeps_dictionary_result_with_detection() {
        let text = "this is a badword here";
        let (engine, model) = scripted(&["badword"], ScriptedModel::new(LABELS));

        let result = engine.enhanced_filter(text).await;

        assert_eq!(result.filtered_text, "this is a ******* here");
        assert_eq!(result.matches, vec!["badword"]);
        assert!(result.was_filtered);
        let detection = result.ai_detection.unwrap();
        assert!(!detection.is_profane);
        assert_eq!(detection.categories.len(), LABELS.len());
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn load_failure_falls_back_to_dictionary() {
        let engine = engine_with(&["damn"], Box::new(FailingLoader));

        let result = engine.enhanced_filter("some damn text").await;

        assert_eq!(result, engine.filter("some damn text"));
        assert!(result.ai_detection.is_none());
        assert_eq!(engine.classifier_status(), Some(ClassifierStatus::Unavailable));

        let again = engine.enhanced_filter("some text").await;
        assert_eq!(again.filtered_text, "some text");
        assert!(!again.was_filtered);
    }

    #[tokio::test]
    async fn detection_failure_falls_back_to_dictionary() {
        let text = "some text";
        let (engine, _) = scripted(&[], ScriptedModel::new(LABELS).failing_on(text));

        let result = engine.enhanced_filter(text).await;

        assert_eq!(result, FilterResult::clean(text));
        assert_eq!(engine.classifier_status(), Some(ClassifierStatus::Ready));
    }

    #[tokio::test]
    async fn segment_failure_scores_zero() {
        let text = "oh you meanie ok";
        let (engine, _) = scripted(
            &[],
            ScriptedModel::new(LABELS)
                .with(text, &[0.9, 0.0, 0.0, 0.0])
                .failing_on("meanie"),
        );

        let result = engine.enhanced_filter(text).await;
        assert_eq!(result.filtered_text, text);
        assert!(result.was_filtered);
    }

    #[tokio::test]
    async fn empty_input_never_touches_the_classifier() {
        let (engine, model) = scripted(&["badword"], ScriptedModel::new(LABELS));

        let enhanced = engine.enhanced_filter("").await;
        let plain = engine.filter("");

        for result in [enhanced, plain] {
            assert_eq!(result.filtered_text, "");
            assert!(!result.was_filtered);
            assert!(result.matches.is_empty());
        }
        assert_eq!(model.calls(), 0);
        assert_eq!(engine.classifier_status(), Some(ClassifierStatus::NotLoaded));
    }

    #[tokio::test]
    async fn enhanced_filter_is_deterministic() {
        let text = "you absolute meanie, you jerk";
        let (engine, _) = scripted(
            &["jerk"],
            ScriptedModel::new(LABELS)
                .with(text, &[0.97, 0.2, 0.4, 0.0])
                .with("absolute meanie,", &[0.9, 0.0, 0.0, 0.0])
                .with("meanie,", &[0.88, 0.0, 0.0, 0.0]),
        );

        let first = engine.enhanced_filter(text).await;
        let second = engine.enhanced_filter(text).await;

        assert_eq!(first, second);
        assert_eq!(first.filtered_text, "you **************** you ****");
        assert_eq!(first.filtered_text.chars().count(), text.chars().count());
    }

    #[tokio::test]
    async fn without_classifier_enhanced_is_dictionary_only() {
        let engine = FusionEngine::new(matcher(&["badword"]), None);

        let result = engine.enhanced_filter("a badword").await;
        assert_eq!(result.filtered_text, "a *******");
        assert!(result.ai_detection.is_none());
        assert_eq!(engine.classifier_status(), None);
    }

    #[test]
    fn from_config_respects_classifier_switch() {
        let mut config = HushConfig::default();
        config.classifier.enabled = false;
        config.mask_char = '#';

        let engine = FusionEngine::from_config(&config).unwrap();
        assert!(engine.classifier().is_none());
        assert_eq!(engine.filter("damn").filtered_text, "####");

        config.classifier.enabled = true;
        let engine = FusionEngine::from_config(&config).unwrap();
        assert_eq!(engine.classifier_status(), Some(ClassifierStatus::NotLoaded));
    }

    #[test]
    fn highlight_delegates_to_matcher() {
        let engine = FusionEngine::new(matcher(&["badword"]), None);
        let result = engine.highlight("one badword");
        assert!(result.has_matches);
        assert_eq!(result.spans[0].start, 4);
    }
}
