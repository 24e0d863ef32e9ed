//! Dictionary matcher: deterministic lexicon scan and masking.
//!
//! Scanning is a two-stage pipeline:
//!
//! 1. single-word entries, matched case-insensitively on word boundaries
//!    (so `ass` never fires inside `classic`);
//! 2. phrase entries, matched case-insensitively anywhere.
//!
//! Stage 2 runs against the text already masked by stage 1. Whether an entry
//! counts as matched is decided against the original text, so a phrase whose
//! words were masked in stage 1 is still reported even though nothing is left
//! for it to mask.

use std::collections::HashSet;
use std::sync::Arc;

use regex::{Regex, RegexSet};

use crate::error::LexiconError;
use crate::lexicon::{Lexicon, LexiconEntry};
use crate::mask::mask_ranges;
use crate::result::{push_unique, FilterResult, HighlightResult, Match, MatchSource};

/// Default mask character.
pub const DEFAULT_MASK_CHAR: char = '*';

/// Compiled patterns for one stage of the scan.
struct Stage {
    /// Regex set for finding every entry present in a text in one pass.
    regex_set: RegexSet,
    /// Per-entry regexes, index-aligned with `terms`.
    regexes: Vec<Regex>,
    /// Stored terms.
    terms: Vec<String>,
}

impl Stage {
    fn compile<'a, I>(entries: I, pattern: fn(&str) -> String) -> Result<Self, LexiconError>
    where
        I: Iterator<Item = &'a LexiconEntry>,
    {
        let terms: Vec<String> = entries.map(|e| e.term.clone()).collect();
        let patterns: Vec<String> = terms.iter().map(|t| pattern(t)).collect();

        let regex_set = RegexSet::new(&patterns)?;
        let regexes = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            regex_set,
            regexes,
            terms,
        })
    }

    /// Indices of entries occurring in `text`, in scan order.
    fn matching(&self, text: &str) -> Vec<usize> {
        self.regex_set.matches(text).into_iter().collect()
    }
}

fn word_pattern(term: &str) -> String {
    format!(r"(?i)\b{}\b", regex::escape(term))
}

fn phrase_pattern(term: &str) -> String {
    format!("(?i){}", regex::escape(term))
}

/// Lexicon-based matcher that masks every occurrence of a disallowed term.
pub struct DictionaryMatcher {
    lexicon: Arc<Lexicon>,
    words: Stage,
    phrases: Stage,
    mask: char,
}

impl std::fmt::Debug for DictionaryMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryMatcher")
            .field("words", &self.words.terms.len())
            .field("phrases", &self.phrases.terms.len())
            .field("mask", &self.mask)
            .finish()
    }
}

impl DictionaryMatcher {
    /// Compiles a matcher for the lexicon using the default mask character.
    pub fn new(lexicon: Arc<Lexicon>) -> Result<Self, LexiconError> {
        Self::with_mask(lexicon, DEFAULT_MASK_CHAR)
    }

    /// Compiles a matcher with a custom mask character.
    pub fn with_mask(lexicon: Arc<Lexicon>, mask: char) -> Result<Self, LexiconError> {
        let words = Stage::compile(lexicon.words(), word_pattern)?;
        let phrases = Stage::compile(lexicon.phrases(), phrase_pattern)?;

        Ok(Self {
            lexicon,
            words,
            phrases,
            mask,
        })
    }

    /// Compiles a matcher for the bundled lexicon.
    pub fn bundled() -> Result<Self, LexiconError> {
        Self::new(Lexicon::bundled())
    }

    /// The lexicon this matcher was compiled from.
    pub fn lexicon(&self) -> &Arc<Lexicon> {
        &self.lexicon
    }

    /// The mask character.
    pub fn mask_char(&self) -> char {
        self.mask
    }

    /// Scans `text` and masks every lexicon occurrence.
    pub fn scan(&self, text: &str) -> FilterResult {
        if text.is_empty() {
            return FilterResult::empty();
        }

        let mut matches = Vec::new();
        let mut seen = HashSet::new();
        let mut spans = Vec::new();

        // Stage 1 output is stage 2 input.
        let after_words = self.apply_stage(
            &self.words,
            text,
            text.to_string(),
            &mut matches,
            &mut seen,
            &mut spans,
        );
        let filtered_text = self.apply_stage(
            &self.phrases,
            text,
            after_words,
            &mut matches,
            &mut seen,
            &mut spans,
        );

        spans.sort_by_key(|s| s.start);

        FilterResult {
            filtered_text,
            was_filtered: !matches.is_empty(),
            matches,
            ai_detection: None,
            spans,
        }
    }

    /// Applies one stage: every entry found in `original` masks its
    /// occurrences in the stage input, in scan order.
    fn apply_stage(
        &self,
        stage: &Stage,
        original: &str,
        input: String,
        matches: &mut Vec<String>,
        seen: &mut HashSet<String>,
        spans: &mut Vec<Match>,
    ) -> String {
        let mut current = input;

        for idx in stage.matching(original) {
            let term = &stage.terms[idx];
            push_unique(matches, seen, term);

            let regex = &stage.regexes[idx];
            if !regex.is_match(&current) {
                continue;
            }
            current = mask_ranges(
                &current,
                regex.find_iter(&current).map(|m| m.range()),
                self.mask,
                term,
                MatchSource::Dictionary,
                spans,
            );
        }

        current
    }

    /// Reports where lexicon terms occur in `text` without masking anything.
    pub fn highlight(&self, text: &str) -> HighlightResult {
        if text.is_empty() {
            return HighlightResult::default();
        }

        let mut matches = Vec::new();
        let mut seen = HashSet::new();
        let mut spans = Vec::new();

        for stage in [&self.words, &self.phrases] {
            for idx in stage.matching(text) {
                let term = &stage.terms[idx];
                push_unique(&mut matches, &mut seen, term);

                for m in stage.regexes[idx].find_iter(text) {
                    spans.push(Match {
                        term: term.clone(),
                        start: text[..m.start()].chars().count(),
                        len: m.as_str().chars().count(),
                        source: MatchSource::Dictionary,
                    });
                }
            }
        }

        spans.sort_by_key(|s| s.start);

        HighlightResult {
            has_matches: !matches.is_empty(),
            matches,
            spans,
        }
    }
}
