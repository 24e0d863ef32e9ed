//! Filter configuration.
//!
//! Loaded from a JSON file; every field is optional and falls back to its
//! default.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::classifier::{ClassifierConfig, OnnxModelConfig};
use crate::error::ConfigError;
use crate::lexicon::Lexicon;
use crate::matcher::DEFAULT_MASK_CHAR;

/// Where the lexicon comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    /// Include the bundled English lexicon.
    pub use_bundled: bool,
    /// Additional lexicon file (`.txt` or `.json`).
    pub path: Option<PathBuf>,
    /// Extra terms appended after the files.
    pub extra_terms: Vec<String>,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            use_bundled: true,
            path: None,
            extra_terms: Vec::new(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HushConfig {
    /// Character used for masking.
    pub mask_char: char,
    /// Lexicon sources.
    pub lexicon: LexiconConfig,
    /// Classifier settings.
    pub classifier: ClassifierConfig,
    /// Model files for the ONNX backend.
    pub model: OnnxModelConfig,
}

impl Default for HushConfig {
    fn default() -> Self {
        Self {
            mask_char: DEFAULT_MASK_CHAR,
            lexicon: LexiconConfig::default(),
            classifier: ClassifierConfig::default(),
            model: OnnxModelConfig::from_downloader().unwrap_or_default(),
        }
    }
}

impl HushConfig {
    /// Default config file location (`<config dir>/config.json`).
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "hush", "Hush").map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Parses a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.classifier.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "classifier.threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        if self.classifier.masking_labels.is_empty() {
            return Err(ConfigError::Invalid(
                "classifier.masking_labels must not be empty".to_string(),
            ));
        }
        if self.mask_char.is_whitespace() || self.mask_char.is_alphanumeric() {
            return Err(ConfigError::Invalid(format!(
                "mask_char must not be whitespace or alphanumeric, got {:?}",
                self.mask_char
            )));
        }
        Ok(())
    }

    /// Builds the lexicon: bundled terms, then the lexicon file, then extras.
    pub fn build_lexicon(&self) -> Result<Arc<Lexicon>, ConfigError> {
        let mut lexicon = if self.lexicon.use_bundled {
            (*Lexicon::bundled()).clone()
        } else {
            Lexicon::default()
        };

        if let Some(path) = &self.lexicon.path {
            let loaded = Lexicon::load(path)?;
            tracing::info!("Loaded {} lexicon terms from {:?}", loaded.len(), path);
            lexicon = lexicon.merged(&loaded);
        }

        if !self.lexicon.extra_terms.is_empty() {
            lexicon = lexicon.merged(&Lexicon::new(&self.lexicon.extra_terms));
        }

        Ok(Arc::new(lexicon))
    }
}
