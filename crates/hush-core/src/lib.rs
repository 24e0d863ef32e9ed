//! Hush Core - Profanity detection and length-preserving redaction.
//!
//! Two detectors feed one filtering decision:
//!
//! - [`DictionaryMatcher`]: deterministic lexicon scan. Single words match on
//!   word boundaries, phrases match anywhere; both case-insensitively.
//! - [`ClassifierAdapter`]: probabilistic toxicity model behind a memoised
//!   loader. Used by [`FusionEngine::enhanced_filter`] to mask 1-3 token
//!   segments the lexicon misses.
//!
//! ## Architecture
//!
//! ```text
//! text → DictionaryMatcher (always) → FilterResult
//!                                        │
//!                       enhanced? ───────┤
//!                                        ▼
//!                        ClassifierAdapter::detect(original text)
//!                                        │
//!                     ┌──────────────────┴──────────────────┐
//!                     │ not profane / failed                │ profane
//!                     ▼                                     ▼
//!              dictionary result             extract_segments(masked text)
//!                                                           │
//!                                                           ▼
//!                                          score > threshold, longest first
//!                                                           │
//!                                                           ▼
//!                                                   mask segments
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod fusion;
pub mod lexicon;
pub mod mask;
pub mod matcher;
pub mod model_downloader;
pub mod result;
pub mod segments;

pub use classifier::{
    ClassifierAdapter, ClassifierConfig, ClassifierStatus, LabelPrediction, ModelLoader,
    OnnxModelConfig, OnnxModelLoader, SharedModelLoader, ToxicityModel,
};
pub use config::{HushConfig, LexiconConfig};
pub use error::{ClassifierError, ConfigError, LexiconError};
pub use fusion::FusionEngine;
pub use lexicon::{EntryKind, Lexicon, LexiconEntry};
pub use matcher::{DictionaryMatcher, DEFAULT_MASK_CHAR};
pub use model_downloader::{DownloadError, MlStatus, ModelDownloader};
pub use result::{
    AiDetection, CategoryScore, FilterResult, HighlightResult, Match, MatchSource,
};
pub use segments::{extract_segments, Segment};
