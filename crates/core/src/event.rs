//! Stream events — the typed sequence a pipeline run publishes to its caller.
//!
//! Each variant maps to one wire event name (see [`StreamEvent::event_name`])
//! and serializes to exactly that event's JSON payload:
//! - `sources`          — `{ "sources": [...] }`
//! - `chunk`            — `{ "text": "..." }`
//! - `tool_invocations` — `{ "invocations": [...] }`
//! - `final_response`   — `{ "response", "toolInvocations", "sessionId" }`
//! - `error`            — `{ "error": "..." }`

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::passage::SourceMetadata;
use crate::tool::ToolInvocationRecord;

/// Events emitted during a pipeline run, in the order they happen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamEvent {
    /// Passages selected for the prompt, with citation ordinals.
    Sources { sources: Vec<SourceMetadata> },

    /// Partial text from the model.
    TextDelta { text: String },

    /// Tool calls whose request and response have both been observed.
    ToolInvocations {
        invocations: Vec<ToolInvocationRecord>,
    },

    /// The terminal event of every run.
    #[serde(rename_all = "camelCase")]
    FinalResponse {
        response: String,
        tool_invocations: Vec<ToolInvocationRecord>,
        session_id: String,
    },

    /// A failure; non-fatal unless followed directly by `final_response`.
    Error { error: String },
}

impl StreamEvent {
    /// SSE event name for this event type.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Sources { .. } => "sources",
            Self::TextDelta { .. } => "chunk",
            Self::ToolInvocations { .. } => "tool_invocations",
            Self::FinalResponse { .. } => "final_response",
            Self::Error { .. } => "error",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }
}

/// The outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub accumulated_text: String,
    pub tool_invocations: Vec<ToolInvocationRecord>,
    pub session_id: String,
}

impl GenerationResult {
    /// The terminal wire event for this result.
    pub fn to_event(&self) -> StreamEvent {
        StreamEvent::FinalResponse {
            response: self.accumulated_text.clone(),
            tool_invocations: self.tool_invocations.clone(),
            session_id: self.session_id.clone(),
        }
    }
}

/// The sink was closed by the caller; nothing more can be written.
#[derive(Debug, Clone, thiserror::Error)]
#[error("event sink closed")]
pub struct SinkClosed;

/// A caller-supplied destination for events.
///
/// Writes are synchronous and unbuffered: the event is handed over before
/// `send` returns, in call order.
pub trait EventSink: Send + Sync {
    fn send(&self, event: StreamEvent) -> std::result::Result<(), SinkClosed>;
}

impl EventSink for mpsc::UnboundedSender<StreamEvent> {
    fn send(&self, event: StreamEvent) -> std::result::Result<(), SinkClosed> {
        mpsc::UnboundedSender::send(self, event).map_err(|_| SinkClosed)
    }
}
