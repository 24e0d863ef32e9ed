//! Error types for the filtering core.

use thiserror::Error;

/// Errors raised while building a lexicon or compiling its patterns.
#[derive(Debug, Error)]
pub enum LexiconError {
    /// Failed to read a lexicon file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a JSON lexicon.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A lexicon entry could not be compiled into a pattern.
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Errors from the classifier path.
///
/// None of these ever escape the fusion engine; they are converted into a
/// dictionary-only result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    /// Acquiring the scoring model failed. Enhanced filtering stays disabled
    /// for the rest of the session.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// A single classification call failed.
    #[error("classification failed: {0}")]
    ClassificationFailure(String),

    /// ML feature not enabled.
    #[error("ML feature not enabled - rebuild with --features ml")]
    MlNotEnabled,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The configured lexicon could not be built.
    #[error("lexicon error: {0}")]
    Lexicon(#[from] LexiconError),
}
