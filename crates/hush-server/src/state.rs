//! Application state for the API server.

use std::sync::Arc;
use std::time::Duration;

use hush_core::{ConfigError, FusionEngine, HushConfig};

use crate::ServerConfig;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Dictionary matcher plus the shared classifier.
    pub engine: Arc<FusionEngine>,
    /// Longest accepted text, in characters.
    pub max_text_len: usize,
    /// Deadline for the classifier part of an enhanced request.
    pub classifier_timeout: Option<Duration>,
}

impl AppState {
    /// Creates state around an existing engine.
    pub fn new(engine: FusionEngine, config: &ServerConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            max_text_len: config.max_text_len,
            classifier_timeout: config.classifier_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Builds the engine from a filter configuration.
    pub fn from_config(hush: &HushConfig, config: &ServerConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(FusionEngine::from_config(hush)?, config))
    }
}
