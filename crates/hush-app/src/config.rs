//! Application configuration: filter settings plus the HTTP server section.

use std::path::{Path, PathBuf};

use hush_core::{ConfigError, HushConfig};
use hush_server::ServerConfig;
use serde::{Deserialize, Serialize};

/// Contents of `config.json`.
///
/// Filter settings sit at the top level; the server has its own section:
///
/// ```json
/// { "mask_char": "#", "classifier": { "threshold": 0.7 }, "server": { "port": 9000 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(flatten)]
    pub filter: HushConfig,
    pub server: ServerConfig,
}

/// Command-line overrides, applied last.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub threshold: Option<f32>,
    pub no_ml: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl AppConfig {
    /// Loads `explicit` if given, otherwise the default config file when it
    /// exists, otherwise the defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => match HushConfig::default_path() {
                Some(path) if path.exists() => Self::load(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Reads and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        tracing::debug!("Loading config from {:?}", path);
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.filter.validate()?;
        Ok(config)
    }

    /// Applies command-line overrides and re-validates.
    pub fn apply(mut self, overrides: &Overrides) -> Result<Self, ConfigError> {
        if let Some(threshold) = overrides.threshold {
            self.filter.classifier.threshold = threshold;
        }
        if overrides.no_ml {
            self.filter.classifier.enabled = false;
        }
        if let Some(host) = &overrides.host {
            self.server.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }

        self.filter.validate()?;
        Ok(self)
    }
}

/// Where the default config file lives, for help output.
pub fn default_config_path() -> Option<PathBuf> {
    HushConfig::default_path()
}
