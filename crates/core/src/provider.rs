//! Generation backend trait — the abstraction over streaming LLM inference.
//!
//! A backend receives an assembled message list and returns two handles:
//! a finite, non-restartable channel of [`Chunk`]s and a future resolving
//! to the aggregated [`FinalResult`]. Some backends only report tool
//! requests and responses in the final transcript, never in chunks.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::GenerationError;
use crate::message::Message;

/// A tool definition sent to the model so it knows which tools it may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name, passed through to the backend untouched
    pub name: String,

    /// Description of what the tool does
    pub description: String,
}

/// Per-request generation parameters, already resolved against the model's
/// capability profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// The model to use (e.g. "gemini-2.0-flash", "gpt-4o")
    pub model: String,

    /// Omitted entirely for models that reject a temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Provider field name for the output-token limit
    pub max_tokens_param: String,

    pub max_tokens: u32,
}

impl GenerationConfig {
    /// Render the provider parameter map, using the model family's field names.
    pub fn to_params(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut params = serde_json::Map::new();
        if let Some(t) = self.temperature {
            params.insert("temperature".into(), serde_json::json!(t));
        }
        params.insert(
            self.max_tokens_param.clone(),
            serde_json::json!(self.max_tokens),
        );
        params
    }
}

/// A request to a generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,

    /// Empty when tools are disabled
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    pub config: GenerationConfig,
}

/// The model asked for a tool; `reference` correlates it with its response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub reference: String,
    pub name: String,
    #[serde(default)]
    pub input: serde_json::Value,
}

/// A tool produced output (or failed) for the request with the same `reference`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Partial content delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_requests: Vec<ToolRequest>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_responses: Vec<ToolResponse>,
}

impl Chunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn request(reference: &str, name: &str, input: serde_json::Value) -> Self {
        Self {
            tool_requests: vec![ToolRequest {
                reference: reference.into(),
                name: name.into(),
                input,
            }],
            ..Self::default()
        }
    }

    pub fn response(reference: &str, output: serde_json::Value) -> Self {
        Self {
            tool_responses: vec![ToolResponse {
                reference: reference.into(),
                name: None,
                output,
                error: None,
            }],
            ..Self::default()
        }
    }
}

/// The aggregated outcome of a generation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    /// Full response text
    #[serde(default)]
    pub text: String,

    /// Transcript including any tool request/response parts
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl FinalResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            messages: Vec::new(),
        }
    }
}

/// The two handles returned by [`GenerationBackend::generate_stream`].
pub struct GenerationStream {
    /// Chunks in generation order; closes when the stream is finished
    pub chunks: mpsc::Receiver<Result<Chunk, GenerationError>>,

    /// Resolves once the backend has aggregated the whole response
    pub final_result: BoxFuture<'static, Result<FinalResult, GenerationError>>,
}

/// The core generation backend trait.
///
/// The orchestrator calls `generate_stream()` without knowing which model
/// family sits behind it.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// A human-readable name for this backend (e.g. "vertex", "openai").
    fn name(&self) -> &str;

    /// Start a streaming generation.
    async fn generate_stream(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationStream, GenerationError>;
}
