//! Length-preserving masking primitives.

use std::ops::Range;

use crate::result::{Match, MatchSource};

/// Returns a run of `mask` exactly as long (in code points) as `text`.
pub fn mask_str(text: &str, mask: char) -> String {
    std::iter::repeat(mask).take(text.chars().count()).collect()
}

/// Returns true if a token consists only of mask characters and punctuation,
/// i.e. it was already masked by an earlier pass.
pub fn is_masked_token(token: &str, mask: char) -> bool {
    token.contains(mask) && !token.chars().any(char::is_alphanumeric)
}

/// Replaces every byte range in `ranges` with mask characters and records a
/// span for each.
///
/// Ranges must be ascending, non-overlapping and fall on char boundaries,
/// which holds for `Regex::find_iter` and for segment ranges.
pub(crate) fn mask_ranges<I>(
    text: &str,
    ranges: I,
    mask: char,
    term: &str,
    source: MatchSource,
    spans: &mut Vec<Match>,
) -> String
where
    I: IntoIterator<Item = Range<usize>>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut char_pos = 0;

    for range in ranges {
        let before = &text[last..range.start];
        char_pos += before.chars().count();
        out.push_str(before);

        let len = text[range.clone()].chars().count();
        out.extend(std::iter::repeat(mask).take(len));
        spans.push(Match {
            term: term.to_string(),
            start: char_pos,
            len,
            source,
        });

        char_pos += len;
        last = range.end;
    }

    out.push_str(&text[last..]);
    out
}
