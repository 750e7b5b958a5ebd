//! Client Configuration
//!
//! Centralized configuration loading for chorus, supporting a TOML file at
//! `~/.config/chorus/config.toml`.
//!
//! # Configuration Priority
//!
//! Values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables (`CHORUS_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! The configuration file lives at `$XDG_CONFIG_HOME/chorus/config.toml`
//! (typically `~/.config/chorus/config.toml`).
//!
//! # Example Configuration
//!
//! ```toml
//! [api]
//! url = "https://api.openai.com/v1/chat/completions"
//! key = "sk-..."
//! request_timeout_secs = 120
//! max_retries = 3
//! retry_delay_ms = 1000
//!
//! [models]
//! default = ["gpt-4o", "deepseek-r1"]
//! system_prompt = "Answer concisely."
//!
//! [history]
//! limit = 20
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatcher::MAX_MODELS_PER_TURN;
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::messages::ModelId;

/// Default chat-completion endpoint
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Model selected when nothing else is configured
pub const DEFAULT_MODEL: &str = "gpt-4o";

const ENV_API_URL: &str = "CHORUS_API_URL";
const ENV_API_KEY: &str = "CHORUS_API_KEY";
const ENV_MODELS: &str = "CHORUS_MODELS";
const ENV_HISTORY_LIMIT: &str = "CHORUS_HISTORY_LIMIT";
const ENV_REQUEST_TIMEOUT: &str = "CHORUS_REQUEST_TIMEOUT_SECS";
const ENV_MAX_RETRIES: &str = "CHORUS_MAX_RETRIES";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// No API key from any source
    #[error("No API key configured (set CHORUS_API_KEY or [api].key)")]
    MissingApiKey,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[api]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiToml {
    /// Chat-completion endpoint
    pub url: Option<String>,

    /// Bearer token
    pub key: Option<String>,

    /// Timeout for non-streaming requests in seconds
    pub request_timeout_secs: Option<u64>,

    /// Retry attempts for non-streaming requests
    pub max_retries: Option<u32>,

    /// Delay between retries in milliseconds
    pub retry_delay_ms: Option<u64>,
}

/// `[models]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsToml {
    /// Models a turn is sent to when none are chosen explicitly
    pub default: Option<Vec<String>>,

    /// System prompt prepended to every request
    pub system_prompt: Option<String>,
}

/// `[history]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryToml {
    /// Maximum number of turns kept
    pub limit: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChorusToml {
    /// API section
    pub api: ApiToml,

    /// Models section
    pub models: ModelsToml,

    /// History section
    pub history: HistoryToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved client configuration
///
/// Use [`ClientConfig::load`] to load with proper priority handling, then
/// [`ClientConfig::validate`] before building a client.
#[derive(Clone)]
pub struct ClientConfig {
    /// Chat-completion endpoint
    pub api_url: String,

    /// Bearer token (empty when unset)
    pub api_key: String,

    /// Models a turn is sent to by default
    pub default_models: Vec<ModelId>,

    /// Maximum number of turns kept in history
    pub history_limit: usize,

    /// Timeout for non-streaming requests
    pub request_timeout: Duration,

    /// Retry attempts for non-streaming requests
    pub max_retries: u32,

    /// Delay between retries
    pub retry_delay: Duration,

    /// System prompt prepended to every request
    pub system_prompt: Option<String>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("default_models", &self.default_models)
            .field("history_limit", &self.history_limit)
            .field("request_timeout", &self.request_timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("config_file_path", &self.config_file_path)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            default_models: vec![ModelId::from(DEFAULT_MODEL)],
            history_limit: DEFAULT_HISTORY_LIMIT,
            request_timeout: Duration::from_secs(120),
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            system_prompt: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Load from the default path, environment and defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed. A missing config file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(default_config_path())
    }

    /// Load from a specific path
    ///
    /// If `path` is `None`, only defaults and environment variables are used.
    ///
    /// # Errors
    ///
    /// Returns an error if the specified config file cannot be read or parsed.
    pub fn load_from_path(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(ref config_path) = path {
            if config_path.exists() {
                let toml_content =
                    std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                        path: config_path.clone(),
                        source: e,
                    })?;

                let toml_config: ChorusToml = toml::from_str(&toml_content)?;
                config.apply_toml(&toml_config);
                config.config_file_path = Some(config_path.clone());
                config.source = ConfigSource::File;

                tracing::info!(
                    path = %config_path.display(),
                    "Loaded configuration from file"
                );
            } else {
                tracing::debug!(
                    path = %config_path.display(),
                    "Config file not found, using defaults"
                );
            }
        }

        config.apply_env(|key| std::env::var(key).ok());

        Ok(config)
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check that the configuration can drive a client
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingApiKey`] if no key is set, or a
    /// [`ConfigError::ValidationError`] for out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "api_url must be an http(s) URL, got {:?}",
                self.api_url
            )));
        }

        if self.default_models.is_empty() || self.default_models.len() > MAX_MODELS_PER_TURN {
            return Err(ConfigError::ValidationError(format!(
                "between 1 and {MAX_MODELS_PER_TURN} default models required, got {}",
                self.default_models.len()
            )));
        }

        if self.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "history limit must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Apply TOML configuration values
    fn apply_toml(&mut self, toml: &ChorusToml) {
        if let Some(ref url) = toml.api.url {
            self.api_url.clone_from(url);
        }
        if let Some(ref key) = toml.api.key {
            self.api_key.clone_from(key);
        }
        if let Some(secs) = toml.api.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = toml.api.max_retries {
            self.max_retries = retries;
        }
        if let Some(delay) = toml.api.retry_delay_ms {
            self.retry_delay = Duration::from_millis(delay);
        }

        if let Some(ref models) = toml.models.default {
            self.default_models = models.iter().map(|m| ModelId::from(m.as_str())).collect();
        }
        if toml.models.system_prompt.is_some() {
            self.system_prompt.clone_from(&toml.models.system_prompt);
        }

        if let Some(limit) = toml.history.limit {
            self.history_limit = limit;
        }
    }

    /// Apply environment overrides read through `var`
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(ENV_API_URL) {
            self.api_url = url;
            self.source = ConfigSource::Env;
        }
        if let Some(key) = var(ENV_API_KEY) {
            self.api_key = key;
            self.source = ConfigSource::Env;
        }
        if let Some(models) = var(ENV_MODELS) {
            let models = parse_model_list(&models);
            if !models.is_empty() {
                self.default_models = models;
                self.source = ConfigSource::Env;
            }
        }
        if let Some(limit) = var(ENV_HISTORY_LIMIT) {
            if let Ok(n) = limit.parse::<usize>() {
                self.history_limit = n;
                self.source = ConfigSource::Env;
            }
        }
        if let Some(timeout) = var(ENV_REQUEST_TIMEOUT) {
            if let Ok(secs) = timeout.parse::<u64>() {
                self.request_timeout = Duration::from_secs(secs);
                self.source = ConfigSource::Env;
            }
        }
        if let Some(retries) = var(ENV_MAX_RETRIES) {
            if let Ok(n) = retries.parse::<u32>() {
                self.max_retries = n;
                self.source = ConfigSource::Env;
            }
        }
    }
}

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/chorus/config.toml` or
/// `~/.config/chorus/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("chorus").join("config.toml"))
}

/// Split a comma-separated model list, dropping blanks
fn parse_model_list(list: &str) -> Vec<ModelId> {
    list.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(ModelId::from)
        .collect()
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`ClientConfig::load`] to apply command-line overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Endpoint override
    pub api_url: Option<String>,

    /// Default models override
    pub models: Option<Vec<ModelId>>,

    /// History limit override
    pub history_limit: Option<usize>,

    /// System prompt override
    pub system_prompt: Option<String>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set endpoint override
    #[must_use]
    pub fn with_api_url(mut self, url: String) -> Self {
        self.api_url = Some(url);
        self
    }

    /// Set default models override
    #[must_use]
    pub fn with_models(mut self, models: Vec<ModelId>) -> Self {
        self.models = Some(models);
        self
    }

    /// Set history limit override
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Set system prompt override
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ClientConfig) {
        let models = self.models.as_ref().filter(|m| !m.is_empty());

        if self.api_url.is_some()
            || models.is_some()
            || self.history_limit.is_some()
            || self.system_prompt.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.api_url {
            config.api_url.clone_from(url);
        }
        if let Some(models) = models {
            config.default_models.clone_from(models);
        }
        if let Some(limit) = self.history_limit {
            config.history_limit = limit;
        }
        if self.system_prompt.is_some() {
            config.system_prompt.clone_from(&self.system_prompt);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
