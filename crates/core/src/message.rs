//! Message and Query domain types.
//!
//! A [`Query`] arrives from the caller, its history and the assembled
//! prompt are sequences of [`Message`], and each message is a list of
//! [`Part`]s: plain text or a reference to a tool call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The language model
    Model,
    /// Tool execution result
    Tool,
}

/// One piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text {
        text: String,
    },

    /// The model asked for a tool to run.
    ToolRequest {
        reference: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    /// A tool produced output for an earlier request.
    ToolResponse {
        reference: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default)]
        output: serde_json::Value,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }
}

/// A single message in a conversation or prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// Ordered content parts
    pub content: Vec<Part>,
}

impl Message {
    /// Create a message with a single text part.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![Part::text(text)],
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// Named sampling presets; numeric values come from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperaturePreset {
    Precise,
    #[default]
    Balanced,
    Creative,
}

/// A user query as received from the caller. Never mutated by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// The question text
    pub text: String,

    /// Scopes retrieval to one session's documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Overrides the configured default model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,

    #[serde(default)]
    pub temperature_preset: TemperaturePreset,

    /// Maximum output tokens; `None` uses the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tools the caller wants enabled for this query
    #[serde(default)]
    pub tool_names: BTreeSet<String>,

    /// Prior conversation, oldest first
    #[serde(default)]
    pub history: Vec<Message>,
}

impl Query {
    /// A query with no session, history or tools.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: None,
            model_id: None,
            temperature_preset: TemperaturePreset::default(),
            max_tokens: None,
            tool_names: BTreeSet::new(),
            history: Vec::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tool_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }
}
