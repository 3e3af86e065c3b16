//! Configuration file support

use rill_ai::providers::openai::OPENROUTER_API_KEY_ENV;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading or writing the config file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Configuration for rill
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default model id
    pub model: Option<String>,
    /// Default sampling temperature (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Endpoint root for an OpenAI-compatible API
    pub base_url: Option<String>,
    /// Seconds to wait for each chunk before giving up
    pub read_timeout_secs: Option<u64>,
    /// Seconds a whole reply may take
    pub stream_timeout_secs: Option<u64>,
    /// Consecutive malformed event lines tolerated (0 = unlimited)
    pub max_malformed_lines: Option<usize>,
    /// API keys (alternative to environment variables)
    #[serde(default)]
    pub api_keys: ApiKeys,
}

/// API key configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub openrouter: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rill")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("RILL_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default path, falling back to defaults with a
    /// warning when the file is unreadable.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}", e);
                Self::default()
            }
        }
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save config to a specific file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(io_err)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> Result<PathBuf, ConfigError> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            model: Some(rill_ai::models::DEFAULT_MODEL_ID.to_string()),
            temperature: Some(rill_ai::types::DEFAULT_TEMPERATURE),
            ..Default::default()
        };
        default_config.save_to(&path)?;
        Ok(path)
    }

    /// API key from the config file, then the environment
    pub fn get_api_key(&self) -> Option<String> {
        self.api_keys
            .openrouter
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(OPENROUTER_API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }

    /// Malformed-line cap as the decoder expects it
    pub fn malformed_line_cap(&self) -> Option<usize> {
        match self.max_malformed_lines {
            Some(0) => None,
            Some(n) => Some(n),
            None => Some(rill_ai::stream::DEFAULT_MAX_MALFORMED_LINES),
        }
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# rill configuration file
# Place at ~/.config/rill/config.toml (Linux) or set RILL_CONFIG_PATH

# Default model to use
model = "openai/gpt-oss-120b"

# Sampling temperature, 0.0 - 2.0
temperature = 0.7

# OpenAI-compatible endpoint (defaults to OpenRouter)
# base_url = "https://openrouter.ai/api/v1"

# Give up if a single chunk takes longer than this (unset = wait forever)
# read_timeout_secs = 60

# Give up if a whole reply takes longer than this
# stream_timeout_secs = 600

# Consecutive unparseable event lines tolerated before a reply fails (0 = unlimited)
# max_malformed_lines = 64

# API keys (optional - OPENROUTER_API_KEY in the environment or .env also works)
[api_keys]
# openrouter = "sk-or-..."
"#
}
