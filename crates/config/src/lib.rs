//! Configuration loading, validation, and management for cairn.
//!
//! Loads configuration from `~/.cairn/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.cairn/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion and embedding provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider kind: "openai", "openrouter", "ollama", "custom" or "hashing" (offline embeddings)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL override (required for "custom")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Completion model
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling mass
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Embedding gateway configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Document store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Context assembly configuration
    #[serde(default)]
    pub context: ContextConfig,

    /// Agent identity configuration
    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    1.0
}
fn default_top_p() -> f32 {
    1.0
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("embedding", &self.embedding)
            .field("store", &self.store)
            .field("context", &self.context)
            .field("agent", &self.agent)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Components per vector requested from the provider
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Decimal digits kept per component
    #[serde(default = "default_precision")]
    pub precision: u32,

    /// Total attempts per batch before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Per-call timeout
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_dimensions() -> usize {
    128
}
fn default_precision() -> u32 {
    5
}
fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    8_000
}
fn default_embedding_timeout() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            precision: default_precision(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// What `close_document` does with unsaved edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosePolicy {
    /// Drop edits silently.
    Discard,
    /// Drop edits and log a warning.
    #[default]
    Warn,
    /// Persist before evicting.
    Save,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one `<title>.json` per document.
    /// Defaults to `~/.cairn/documents`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<PathBuf>,

    /// Maximum estimated tokens per text chunk
    #[serde(default = "default_chunk_tokens")]
    pub chunk_tokens: usize,

    #[serde(default)]
    pub close_policy: ClosePolicy,
}

fn default_chunk_tokens() -> usize {
    100
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            folder: None,
            chunk_tokens: default_chunk_tokens(),
            close_policy: ClosePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Model context window
    #[serde(default = "default_token_limit")]
    pub token_limit: usize,

    /// Tokens reserved for the reply
    #[serde(default = "default_max_response_tokens")]
    pub max_response_tokens: usize,

    #[serde(default = "default_retrieval_limit")]
    pub retrieval_limit: usize,

    #[serde(default = "default_retrieval_threshold")]
    pub retrieval_threshold: f32,

    /// Messages longer than this are truncated when added to the history
    #[serde(default = "default_max_message_tokens")]
    pub max_message_tokens: usize,

    /// Default decay counter for observations
    #[serde(default = "default_observation_lasting")]
    pub observation_lasting: u32,

    #[serde(default = "default_completion_timeout")]
    pub completion_timeout_secs: u64,
}

fn default_token_limit() -> usize {
    32_000
}
fn default_max_response_tokens() -> usize {
    4_000
}
fn default_retrieval_limit() -> usize {
    15
}
fn default_retrieval_threshold() -> f32 {
    0.4
}
fn default_max_message_tokens() -> usize {
    4_000
}
fn default_observation_lasting() -> u32 {
    3
}
fn default_completion_timeout() -> u64 {
    120
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_limit: default_token_limit(),
            max_response_tokens: default_max_response_tokens(),
            retrieval_limit: default_retrieval_limit(),
            retrieval_threshold: default_retrieval_threshold(),
            max_message_tokens: default_max_message_tokens(),
            observation_lasting: default_observation_lasting(),
            completion_timeout_secs: default_completion_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    #[serde(default = "default_username")]
    pub username: String,

    /// System instructions added as the first header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprompt: Option<String>,

    /// JSON document created if missing and loaded for every chat;
    /// empty disables it
    #[serde(default = "default_memory_document")]
    pub memory_document: String,
}

fn default_agent_name() -> String {
    "Agent".into()
}
fn default_username() -> String {
    "User".into()
}
fn default_memory_document() -> String {
    "memory".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            username: default_username(),
            preprompt: None,
            memory_document: default_memory_document(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.cairn/config.toml).
    ///
    /// Environment overrides:
    /// - `CAIRN_API_KEY`, then `OPENAI_API_KEY` (only when the file has none)
    /// - `CAIRN_PROVIDER`, `CAIRN_MODEL`, `CAIRN_STORE_DIR`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env();
        Ok(config)
    }

    /// Apply the environment overrides listed on [`load`](Self::load).
    pub fn apply_env(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("CAIRN_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("CAIRN_PROVIDER") {
            self.provider = provider;
        }

        if let Ok(model) = std::env::var("CAIRN_MODEL") {
            self.model = model;
        }

        if let Ok(dir) = std::env::var("CAIRN_STORE_DIR") {
            self.store.folder = Some(PathBuf::from(dir));
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".cairn")
    }

    /// Directory holding persisted documents.
    pub fn store_dir(&self) -> PathBuf {
        self.store
            .folder
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("documents"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.top_p <= 0.0 || self.top_p > 1.0 {
            return Err(ConfigError::ValidationError(
                "top_p must be in (0.0, 1.0]".into(),
            ));
        }

        if self.embedding.dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimensions must be > 0".into(),
            ));
        }

        if self.embedding.precision > 10 {
            return Err(ConfigError::ValidationError(
                "embedding.precision must be at most 10".into(),
            ));
        }

        if self.embedding.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.max_attempts must be >= 1".into(),
            ));
        }

        if self.context.max_response_tokens >= self.context.token_limit {
            return Err(ConfigError::ValidationError(
                "context.max_response_tokens must be below context.token_limit".into(),
            ));
        }

        if !(-1.0..=1.0).contains(&self.context.retrieval_threshold) {
            return Err(ConfigError::ValidationError(
                "context.retrieval_threshold must be between -1.0 and 1.0".into(),
            ));
        }

        if self.embedding.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.timeout_secs must be > 0".into(),
            ));
        }

        if self.context.completion_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "context.completion_timeout_secs must be > 0".into(),
            ));
        }

        if self.store.chunk_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "store.chunk_tokens must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            api_url: None,
            model: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            embedding: EmbeddingConfig::default(),
            store: StoreConfig::default(),
            context: ContextConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for cairn_core::Error {
    fn from(e: ConfigError) -> Self {
        cairn_core::Error::Config {
            message: e.to_string(),
        }
    }
}
