//! Prompt template provider trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TemplateError;
use crate::message::Message;

/// Values a template may interpolate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateVars {
    /// The raw user question
    pub query: String,

    /// Citation-annotated passage text, one block per selected passage
    pub context: String,

    /// Number of selected passages
    pub source_count: usize,
}

/// Renders prompt messages from template variables.
///
/// Rendering may fail or return nothing; the assembler always has a
/// synthesized prompt to fall back to.
#[async_trait]
pub trait PromptTemplate: Send + Sync {
    fn name(&self) -> &str;

    async fn render(&self, vars: &TemplateVars) -> std::result::Result<Vec<Message>, TemplateError>;
}
