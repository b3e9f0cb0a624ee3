//! Model capability profiles, looked up by longest matching model-id prefix.

use ragstream_core::provider::GenerationConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a model family accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Whether a `temperature` parameter may be sent
    #[serde(default = "default_true")]
    pub supports_temperature: bool,

    /// Provider field name for the output-token limit
    #[serde(default = "default_max_tokens_param")]
    pub max_tokens_param: String,

    /// Context window in tokens; the history budget is derived from it
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

fn default_true() -> bool {
    true
}
fn default_max_tokens_param() -> String {
    "max_tokens".into()
}
fn default_context_window() -> usize {
    8192
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self {
            supports_temperature: true,
            max_tokens_param: default_max_tokens_param(),
            context_window: default_context_window(),
        }
    }
}

impl ModelCapabilities {
    fn new(supports_temperature: bool, max_tokens_param: &str, context_window: usize) -> Self {
        Self {
            supports_temperature,
            max_tokens_param: max_tokens_param.into(),
            context_window,
        }
    }

    /// Per-request generation parameters for a model with this profile.
    ///
    /// The temperature is dropped when the model does not accept one.
    pub fn generation_config(&self, model: &str, temperature: f32, max_tokens: u32) -> GenerationConfig {
        GenerationConfig {
            model: model.to_string(),
            temperature: self.supports_temperature.then_some(temperature),
            max_tokens_param: self.max_tokens_param.clone(),
            max_tokens,
        }
    }
}

/// Prefix → capabilities, read-only after construction.
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    entries: HashMap<String, ModelCapabilities>,
    fallback: ModelCapabilities,
}

impl CapabilityTable {
    /// The built-in table for well-known model families.
    pub fn builtin() -> Self {
        let entries = [
            ("gpt-4o", ModelCapabilities::new(true, "max_tokens", 128_000)),
            ("gpt-4.1", ModelCapabilities::new(true, "max_tokens", 1_000_000)),
            ("gpt-5", ModelCapabilities::new(false, "max_completion_tokens", 400_000)),
            ("o1", ModelCapabilities::new(false, "max_completion_tokens", 200_000)),
            ("o3", ModelCapabilities::new(false, "max_completion_tokens", 200_000)),
            ("o4", ModelCapabilities::new(false, "max_completion_tokens", 200_000)),
            ("claude-", ModelCapabilities::new(true, "max_tokens", 200_000)),
            ("gemini-", ModelCapabilities::new(true, "max_output_tokens", 1_000_000)),
            ("gemini-1.0", ModelCapabilities::new(true, "max_output_tokens", 32_000)),
        ]
        .into_iter()
        .map(|(prefix, caps)| (prefix.to_string(), caps))
        .collect();

        Self {
            entries,
            fallback: ModelCapabilities::default(),
        }
    }

    /// The built-in table with configured entries layered on top.
    pub fn with_overrides(overrides: &HashMap<String, ModelCapabilities>) -> Self {
        let mut table = Self::builtin();
        for (prefix, caps) in overrides {
            table.entries.insert(prefix.clone(), caps.clone());
        }
        table
    }

    /// Capabilities for `model_id`: the entry with the longest matching
    /// prefix, or safe defaults when nothing matches.
    pub fn lookup(&self, model_id: &str) -> &ModelCapabilities {
        self.entries
            .iter()
            .filter(|(prefix, _)| model_id.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, caps)| caps)
            .unwrap_or(&self.fallback)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::builtin()
    }
}
