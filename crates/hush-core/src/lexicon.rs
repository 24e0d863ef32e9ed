//! The lexicon of disallowed terms and phrases.
//!
//! A [`Lexicon`] is an immutable, ordered list of entries. Entries are stored
//! trimmed and lower-cased; that stored form is what gets reported back in
//! filter results. Order carries no meaning beyond scan order.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::LexiconError;

/// Word list compiled into the binary.
const BUNDLED_LEXICON: &str = include_str!("../data/lexicon.txt");

/// Shared instance of the bundled lexicon.
static BUNDLED: Lazy<Arc<Lexicon>> = Lazy::new(|| Arc::new(Lexicon::from_txt(BUNDLED_LEXICON)));

/// Whether an entry is a single word or a multi-word phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// No internal whitespace; matched on word boundaries.
    Word,
    /// Contains internal whitespace; matched anywhere.
    Phrase,
}

impl EntryKind {
    /// Classifies a (trimmed) term.
    pub fn of(term: &str) -> Self {
        if term.chars().any(char::is_whitespace) {
            EntryKind::Phrase
        } else {
            EntryKind::Word
        }
    }
}

/// A single lexicon entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexiconEntry {
    /// The stored (lower-cased) term.
    pub term: String,
    /// Word or phrase.
    pub kind: EntryKind,
}

/// Immutable, ordered collection of disallowed terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lexicon {
    entries: Vec<LexiconEntry>,
}

impl Lexicon {
    /// Builds a lexicon from the given terms.
    ///
    /// Terms are trimmed and lower-cased. Blank terms are skipped and
    /// duplicates collapse onto their first occurrence.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for term in terms {
            let term = term.as_ref().trim().to_lowercase();
            if term.is_empty() || !seen.insert(term.clone()) {
                continue;
            }
            entries.push(LexiconEntry {
                kind: EntryKind::of(&term),
                term,
            });
        }

        Self { entries }
    }

    /// Returns the shared bundled lexicon.
    pub fn bundled() -> Arc<Lexicon> {
        Arc::clone(&BUNDLED)
    }

    /// Parses a plain text word list (one term per line, `#` starts a comment line).
    pub fn from_txt(txt: &str) -> Self {
        Self::new(
            txt.lines()
                .map(str::trim)
                .filter(|line| !line.starts_with('#')),
        )
    }

    /// Parses a JSON lexicon.
    ///
    /// Accepts either an array of strings or an array of objects:
    ///
    /// ```json
    /// ["word", "some phrase", {"term": "other"}]
    /// ```
    pub fn from_json(json: &str) -> Result<Self, LexiconError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum JsonEntry {
            Plain(String),
            Object { term: String },
        }

        let entries: Vec<JsonEntry> = serde_json::from_str(json)?;
        Ok(Self::new(entries.into_iter().map(|e| match e {
            JsonEntry::Plain(term) | JsonEntry::Object { term } => term,
        })))
    }

    /// Loads a lexicon from a file. `.json` files are parsed as JSON, anything
    /// else as a plain word list.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LexiconError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let lexicon = if is_json {
            Self::from_json(&contents)?
        } else {
            Self::from_txt(&contents)
        };

        tracing::debug!(path = %path.display(), terms = lexicon.len(), "Loaded lexicon");
        Ok(lexicon)
    }

    /// Returns a new lexicon containing this lexicon's entries followed by
    /// the other's (duplicates dropped).
    pub fn merged(&self, other: &Lexicon) -> Self {
        Self::new(self.terms().chain(other.terms()))
    }

    /// All stored terms in scan order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.term.as_str())
    }

    /// Single-word entries in scan order.
    pub fn words(&self) -> impl Iterator<Item = &LexiconEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::Word)
    }

    /// Phrase entries in scan order.
    pub fn phrases(&self) -> impl Iterator<Item = &LexiconEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::Phrase)
    }

    /// Returns true if the lexicon holds the term (case-insensitive).
    pub fn contains(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        self.entries.iter().any(|e| e.term == term)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the lexicon has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn new_normalizes_and_dedupes() {
        let lexicon = Lexicon::new(["  BadWord ", "badword", "", "Bad Phrase"]);
        let terms: Vec<&str> = lexicon.terms().collect();
        assert_eq!(terms, vec!["badword", "bad phrase"]);
    }

    #[test]
    fn entry_kind_detects_phrases() {
        assert_eq!(EntryKind::of("word"), EntryKind::Word);
        assert_eq!(EntryKind::of("two words"), EntryKind::Phrase);
        assert_eq!(EntryKind::of("tab\tseparated"), EntryKind::Phrase);
    }

    #[test]
    fn words_and_phrases_are_split() {
        let lexicon = Lexicon::new(["one", "two words", "three"]);
        assert_eq!(lexicon.words().count(), 2);
        assert_eq!(lexicon.phrases().count(), 1);
        assert_eq!(lexicon.phrases().next().unwrap().term, "two words");
    }

    #[test]
    fn from_txt_skips_comments_and_blanks() {
        let lexicon = Lexicon::from_txt("# header\nalpha\n\n  beta  \n# gamma\n");
        let terms: Vec<&str> = lexicon.terms().collect();
        assert_eq!(terms, vec!["alpha", "beta"]);
    }

    #[test]
    fn from_json_accepts_strings_and_objects() {
        let lexicon = Lexicon::from_json(r#"["Alpha", {"term": "beta gamma"}]"#).unwrap();
        assert!(lexicon.contains("alpha"));
        assert!(lexicon.contains("BETA GAMMA"));
        assert_eq!(lexicon.len(), 2);
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(Lexicon::from_json("{not json").is_err());
    }

    #[test]
    fn bundled_lexicon_is_shared_and_populated() {
        let a = Lexicon::bundled();
        let b = Lexicon::bundled();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!a.is_empty());
        assert!(a.phrases().count() > 0);
        assert!(!a.terms().any(|t| t.starts_with('#')));
    }

    #[test]
    fn merged_keeps_order_and_drops_duplicates() {
        let base = Lexicon::new(["a", "b"]);
        let extra = Lexicon::new(["b", "c"]);
        let merged = base.merged(&extra);
        let terms: Vec<&str> = merged.terms().collect();
        assert_eq!(terms, vec!["a", "b", "c"]);
    }

    #[test]
    fn load_picks_format_from_extension() {
        let dir = tempfile::tempdir().unwrap();

        let txt_path = dir.path().join("words.txt");
        let mut f = std::fs::File::create(&txt_path).unwrap();
        writeln!(f, "one\ntwo three").unwrap();
        let txt = Lexicon::load(&txt_path).unwrap();
        assert_eq!(txt.len(), 2);

        let json_path = dir.path().join("words.json");
        std::fs::write(&json_path, r#"["four"]"#).unwrap();
        let json = Lexicon::load(&json_path).unwrap();
        assert!(json.contains("four"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = Lexicon::load("does/not/exist.txt").unwrap_err();
        assert!(matches!(err, LexiconError::Io(_)));
    }
}
