//! Candidate segment extraction for classifier scoring.
//!
//! Text is split on whitespace runs into tokens. For each token index `i` the
//! extractor yields the unigram `[i]`, then the bigram `[i, i+1]` and the
//! trigram `[i, i+2]` when those tokens exist. Segments are slices of the
//! source text, so multi-token segments keep the original whitespace between
//! their tokens.

use std::ops::Range;

/// Longest segment, in tokens.
pub const MAX_SEGMENT_TOKENS: usize = 3;

/// A candidate sub-span of the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// The segment text, borrowed from the source.
    pub text: &'a str,
    /// Byte offset of the segment in the source.
    pub start: usize,
    /// Number of tokens (1 to 3).
    pub tokens: usize,
    /// Position in extraction order.
    pub index: usize,
}

impl Segment<'_> {
    /// Byte range of the segment in the source.
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.text.len()
    }

    /// Iterates over the segment's tokens.
    pub fn words(&self) -> std::str::SplitWhitespace<'_> {
        self.text.split_whitespace()
    }
}

/// Iterator over the segments of a text. Regenerate it to scan again.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    source: &'a str,
    tokens: Vec<Range<usize>>,
    token: usize,
    width: usize,
    emitted: usize,
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.token < self.tokens.len() {
            let last = self.token + self.width - 1;
            if self.width > MAX_SEGMENT_TOKENS || last >= self.tokens.len() {
                self.token += 1;
                self.width = 1;
                continue;
            }

            let start = self.tokens[self.token].start;
            let end = self.tokens[last].end;
            let segment = Segment {
                text: &self.source[start..end],
                start,
                tokens: self.width,
                index: self.emitted,
            };

            self.width += 1;
            self.emitted += 1;
            return Some(segment);
        }

        None
    }
}

/// Byte ranges of the whitespace-delimited tokens of `text`.
fn token_ranges(text: &str) -> Vec<Range<usize>> {
    let mut tokens = Vec::new();
    let mut start = None;

    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                tokens.push(s..i);
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }

    if let Some(s) = start {
        tokens.push(s..text.len());
    }

    tokens
}

/// Extracts 1-3 token candidate segments from `text`, in token order.
///
/// Identical segment strings may be yielded more than once; deduplicate after
/// scoring.
pub fn extract_segments(text: &str) -> Segments<'_> {
    Segments {
        source: text,
        tokens: token_ranges(text),
        token: 0,
        width: 1,
        emitted: 0,
    }
}
