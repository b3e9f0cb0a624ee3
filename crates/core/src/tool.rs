//! Tools the model may call, and the records of calls that completed.
//!
//! Tools run inside the generation backend. The pipeline only decides which
//! names are enabled and passes their definitions through; it never
//! dispatches on a tool name itself.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// The closed set of tools a backend can be asked to enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinTool {
    WebSearch,
    UrlFetch,
    CodeExecution,
}

impl BuiltinTool {
    pub const ALL: [BuiltinTool; 3] = [
        BuiltinTool::WebSearch,
        BuiltinTool::UrlFetch,
        BuiltinTool::CodeExecution,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::WebSearch => "web_search",
            Self::UrlFetch => "url_fetch",
            Self::CodeExecution => "code_execution",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::WebSearch => "Search the public web for up-to-date information",
            Self::UrlFetch => "Fetch and read the content of a URL",
            Self::CodeExecution => "Run short code snippets in a sandbox",
        }
    }

    /// Credential keys that must be present before the tool can be enabled.
    pub fn required_credentials(&self) -> &'static [&'static str] {
        match self {
            Self::WebSearch => &["SEARCH_API_KEY"],
            Self::UrlFetch => &[],
            Self::CodeExecution => &[],
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
        }
    }
}

/// A tool resolved at startup, with whatever credentials were missing then.
#[derive(Debug, Clone)]
struct ToolEntry {
    tool: BuiltinTool,
    missing_credential: Option<String>,
}

/// Name → tool table, built once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, checking its credentials through `lookup`.
    /// Replaces any existing entry with the same name.
    pub fn register<F>(&mut self, tool: BuiltinTool, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing_credential = tool
            .required_credentials()
            .iter()
            .find(|key| lookup(key).is_none_or(|v| v.trim().is_empty()))
            .map(|key| key.to_string());
        self.tools.insert(
            tool.name().to_string(),
            ToolEntry {
                tool,
                missing_credential,
            },
        );
    }

    /// Resolve the requested names into definitions for the backend.
    ///
    /// Names that cannot be enabled come back as errors; they are dropped
    /// from the definitions rather than failing the request.
    pub fn resolve(&self, names: &BTreeSet<String>) -> (Vec<ToolDefinition>, Vec<ToolError>) {
        let mut definitions = Vec::new();
        let mut errors = Vec::new();

        for name in names {
            match self.tools.get(name) {
                None => errors.push(ToolError::Unknown(name.clone())),
                Some(ToolEntry {
                    missing_credential: Some(key),
                    ..
                }) => errors.push(ToolError::missing_credential(name, key)),
                Some(entry) => definitions.push(entry.tool.to_definition()),
            }
        }

        (definitions, errors)
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// A completed tool call, reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    pub name: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
