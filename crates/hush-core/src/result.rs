//! Result types shared by the matcher, the classifier adapter and the fusion
//! engine.
//!
//! Field names serialize in camelCase (`filteredText`, `wasFiltered`,
//! `aiDetection`, ...) since these structures are what a UI consumes.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Which detector produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// The lexicon-based dictionary matcher.
    Dictionary,
    /// A classifier-flagged segment.
    Classifier,
}

/// One masked (or highlighted) occurrence.
///
/// `start` and `len` count Unicode code points. Masking preserves length, so
/// the offsets are valid in both the input and the filtered text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// The matched term in its stored (case-folded) form.
    pub term: String,
    /// Code-point offset of the occurrence.
    pub start: usize,
    /// Code-point length of the occurrence.
    pub len: usize,
    /// Detector that produced the match.
    pub source: MatchSource,
}

/// Score for one classifier category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    /// Category label, e.g. `toxicity`.
    pub label: String,
    /// Whether the probability exceeds the adapter's threshold.
    #[serde(rename = "match")]
    pub is_match: bool,
    /// Probability of the positive class (0.0 to 1.0).
    pub probability: f32,
}

/// Whole-text verdict from the classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiDetection {
    /// True iff any category matched.
    pub is_profane: bool,
    /// Per-category scores in model order.
    pub categories: Vec<CategoryScore>,
}

impl AiDetection {
    /// Builds a detection from category scores.
    pub fn from_categories(categories: Vec<CategoryScore>) -> Self {
        Self {
            is_profane: categories.iter().any(|c| c.is_match),
            categories,
        }
    }
}

/// Outcome of a filtering call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResult {
    /// Input with every match replaced by mask characters.
    pub filtered_text: String,
    /// True iff `matches` is non-empty or the classifier flagged the text.
    pub was_filtered: bool,
    /// Unique matched terms (lexicon stored form or lower-cased segment).
    pub matches: Vec<String>,
    /// Classifier verdict, absent on the dictionary-only path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_detection: Option<AiDetection>,
    /// Every masked occurrence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spans: Vec<Match>,
}

impl FilterResult {
    /// Result for empty input.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Result for text with nothing to mask.
    pub fn clean(text: &str) -> Self {
        Self {
            filtered_text: text.to_string(),
            ..Self::default()
        }
    }

    /// Returns true if the classifier flagged the text.
    pub fn ai_flagged(&self) -> bool {
        self.ai_detection
            .as_ref()
            .map(|d| d.is_profane)
            .unwrap_or(false)
    }
}

/// Outcome of a highlight call: where terms occur, without masking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightResult {
    /// True iff any lexicon term occurs.
    pub has_matches: bool,
    /// Unique matched terms.
    pub matches: Vec<String>,
    /// Occurrences in the original text, ordered by position.
    pub spans: Vec<Match>,
}

/// Appends `term` to `terms` unless it is already there.
pub(crate) fn push_unique(terms: &mut Vec<String>, seen: &mut HashSet<String>, term: &str) {
    if seen.insert(term.to_string()) {
        terms.push(term.to_string());
    }
}
