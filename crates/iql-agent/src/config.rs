//! Configuration for the IQL agent
//!
//! Loads configuration from:
//! 1. config.yaml - retry budget, sentinel, model and logging settings
//! 2. .env file - secrets (API keys)
//!
//! Environment variables always override config.yaml values.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_SENTINEL: &str = "UNSUPPORTED_QUERY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Retry controller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Regenerations allowed after the first attempt; 0 disables retries
    pub n_retries: usize,

    /// Marker the model answers with when the question is not expressible
    pub unsupported_sentinel: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            n_retries: 3,
            unsupported_sentinel: DEFAULT_SENTINEL.to_string(),
        }
    }
}

/// Language model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.with_env_overrides()
    }

    /// Like [`Config::load`], falling back to defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Config::default().with_env_overrides()
        }
    }

    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(retries) = std::env::var("IQL_N_RETRIES") {
            self.agent.n_retries = retries.parse().map_err(|_| ConfigError::Invalid {
                key: "IQL_N_RETRIES".to_string(),
                message: format!("expected a non-negative integer, got '{}'", retries),
            })?;
        }
        if let Ok(sentinel) = std::env::var("IQL_UNSUPPORTED_SENTINEL") {
            self.agent.unsupported_sentinel = sentinel;
        }
        if let Ok(model) = std::env::var("IQL_LLM_MODEL") {
            self.llm.model = model;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.unsupported_sentinel.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "agent.unsupported_sentinel".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Get OpenAI API key from environment (must be in .env)
    pub fn get_openai_api_key() -> Result<String, ConfigError> {
        std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))
    }

    /// Set logging environment variables for the logging module
    pub fn apply_logging_env(&self) {
        std::env::set_var("RUST_LOG", &self.logging.level);
        std::env::set_var("LOG_FORMAT", &self.logging.format);
        std::env::set_var("LOG_OUTPUT", &self.logging.output);
        std::env::set_var("LOG_DIR", &self.logging.directory);
    }
}
