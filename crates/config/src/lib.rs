//! Configuration loading, validation, and management for ragstream.
//!
//! Loads configuration from `~/.ragstream/config.toml` with environment
//! variable overrides. Validates all settings at startup.

pub mod capability;

use ragstream_core::message::TemperaturePreset;
use ragstream_core::tool::{BuiltinTool, ToolRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use capability::{CapabilityTable, ModelCapabilities};

/// The root configuration structure.
///
/// Maps directly to `~/.ragstream/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model used when a query does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default max output tokens per response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Retrieval, rerank and prompt settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Numeric values behind the temperature presets
    #[serde(default)]
    pub temperature: TemperatureConfig,

    /// Capability overrides keyed by model-id prefix
    #[serde(default)]
    pub models: HashMap<String, ModelCapabilities>,

    /// Tool configurations keyed by tool name
    #[serde(default)]
    pub tools: HashMap<String, ToolConfig>,
}

fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_max_tokens() -> u32 {
    4096
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Candidates requested from the retrieval store (K)
    #[serde(default = "default_candidate_count")]
    pub candidate_count: usize,

    /// Passages kept for the prompt (N)
    #[serde(default = "default_final_count")]
    pub final_count: usize,

    /// Reranker identifiers, tried in this order
    #[serde(default = "default_rerankers")]
    pub rerankers: Vec<String>,

    #[serde(default = "default_timeout_secs")]
    pub rerank_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub retrieval_timeout_secs: u64,

    /// Share of the model's context window given to history
    #[serde(default = "default_history_ratio")]
    pub history_ratio: f32,

    /// Used when the prompt template supplies no system message
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_candidate_count() -> usize {
    20
}
fn default_final_count() -> usize {
    5
}
fn default_rerankers() -> Vec<String> {
    vec!["semantic".into(), "keyword".into()]
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_history_ratio() -> f32 {
    0.6
}
fn default_system_prompt() -> String {
    "You are a helpful assistant that answers questions using the provided documents. \
     When you use information from a document, cite it with the exact marker that precedes it, \
     for example [Source: report.pdf, Chunk: 0]. If the documents do not contain the answer, say so."
        .into()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            candidate_count: default_candidate_count(),
            final_count: default_final_count(),
            rerankers: default_rerankers(),
            rerank_timeout_secs: default_timeout_secs(),
            retrieval_timeout_secs: default_timeout_secs(),
            history_ratio: default_history_ratio(),
            system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureConfig {
    #[serde(default = "default_precise")]
    pub precise: f32,

    #[serde(default = "default_balanced")]
    pub balanced: f32,

    #[serde(default = "default_creative")]
    pub creative: f32,
}

fn default_precise() -> f32 {
    0.2
}
fn default_balanced() -> f32 {
    0.7
}
fn default_creative() -> f32 {
    1.0
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            precise: default_precise(),
            balanced: default_balanced(),
            creative: default_creative(),
        }
    }
}

impl TemperatureConfig {
    pub fn value(&self, preset: TemperaturePreset) -> f32 {
        match preset {
            TemperaturePreset::Precise => self.precise,
            TemperaturePreset::Balanced => self.balanced,
            TemperaturePreset::Creative => self.creative,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Credential values; keys missing here are looked up in the environment
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub credentials: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            credentials: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for ToolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<&String> = self.credentials.keys().collect();
        f.debug_struct("ToolConfig")
            .field("enabled", &self.enabled)
            .field("credentials", &format!("[REDACTED: {keys:?}]"))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ragstream/config.toml).
    ///
    /// Environment overrides:
    /// - `RAGSTREAM_MODEL`
    /// - `RAGSTREAM_CANDIDATES`
    /// - `RAGSTREAM_FINAL_COUNT`
    /// - `RAGSTREAM_RERANKERS` (comma-separated, in order)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
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

    /// Apply overrides from `env`; a lookup function keeps this testable.
    fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = env("RAGSTREAM_MODEL") {
            self.default_model = model;
        }

        if let Some(raw) = env("RAGSTREAM_CANDIDATES") {
            self.pipeline.candidate_count = parse_count("RAGSTREAM_CANDIDATES", &raw)?;
        }

        if let Some(raw) = env("RAGSTREAM_FINAL_COUNT") {
            self.pipeline.final_count = parse_count("RAGSTREAM_FINAL_COUNT", &raw)?;
        }

        if let Some(raw) = env("RAGSTREAM_RERANKERS") {
            self.pipeline.rerankers = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ragstream")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.final_count == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.final_count must be at least 1".into(),
            ));
        }

        if self.pipeline.candidate_count < self.pipeline.final_count {
            return Err(ConfigError::ValidationError(
                "pipeline.candidate_count must be >= pipeline.final_count".into(),
            ));
        }

        if self.pipeline.retrieval_timeout_secs == 0 || self.pipeline.rerank_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline timeouts must be at least 1 second".into(),
            ));
        }

        if !(self.pipeline.history_ratio > 0.0 && self.pipeline.history_ratio <= 1.0) {
            return Err(ConfigError::ValidationError(
                "pipeline.history_ratio must be in (0.0, 1.0]".into(),
            ));
        }

        let t = &self.temperature;
        if [t.precise, t.balanced, t.creative]
            .iter()
            .any(|v| !(0.0..=2.0).contains(v))
        {
            return Err(ConfigError::ValidationError(
                "temperature presets must be between 0.0 and 2.0".into(),
            ));
        }

        Ok(())
    }

    /// The capability table with this config's overrides applied.
    pub fn capability_table(&self) -> CapabilityTable {
        CapabilityTable::with_overrides(&self.models)
    }

    /// Resolve the tool table once, at startup.
    ///
    /// Every built-in tool is registered unless disabled in config.
    /// Credentials come from the tool's config section, then the environment.
    pub fn tool_registry(&self) -> ToolRegistry {
        self.tool_registry_with(|key| std::env::var(key).ok())
    }

    fn tool_registry_with<F>(&self, env: F) -> ToolRegistry
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut registry = ToolRegistry::new();
        for tool in BuiltinTool::ALL {
            let section = self.tools.get(tool.name());
            if section.is_some_and(|s| !s.enabled) {
                tracing::debug!(tool = tool.name(), "Tool disabled in config");
                continue;
            }
            registry.register(tool, |key| {
                section
                    .and_then(|s| s.credentials.get(key).cloned())
                    .or_else(|| env(key))
            });
        }
        registry
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_count(key: &str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key} must be a positive integer, got '{raw}'")))
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_max_tokens: default_max_tokens(),
            pipeline: PipelineConfig::default(),
            temperature: TemperatureConfig::default(),
            models: HashMap::new(),
            tools: HashMap::new(),
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
