//! Prompt assembly — one system message, then history, then the rendered prompt.
//!
//! The template is tried first; if it is missing, fails or renders nothing,
//! a single synthesized user message carrying the query and the flattened
//! context takes its place.

use std::sync::Arc;

use async_trait::async_trait;
use ragstream_core::chain::first_success;
use ragstream_core::error::TemplateError;
use ragstream_core::message::Message;
use ragstream_core::template::{PromptTemplate, TemplateVars};
use tracing::{debug, warn};

use crate::citation::EnrichedContext;

/// Where the non-history prompt messages came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptSource {
    Template,
    Synthesized,
}

/// The ordered message list sent to the generation backend.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    /// Exactly one system message, at index 0
    pub messages: Vec<Message>,

    /// True when the template was skipped or failed
    pub synthesized: bool,
}

/// Merges a system instruction, trimmed history and prompt messages.
pub struct PromptAssembler {
    default_system: String,
    template: Option<Arc<dyn PromptTemplate>>,
}

impl PromptAssembler {
    pub fn new(default_system: impl Into<String>, template: Option<Arc<dyn PromptTemplate>>) -> Self {
        Self {
            default_system: default_system.into(),
            template,
        }
    }

    /// Assemble the primary prompt: template output (or its fallback) after history.
    pub async fn assemble(
        &self,
        query: &str,
        history: &[Message],
        context: &EnrichedContext,
    ) -> AssembledPrompt {
        let vars = TemplateVars {
            query: query.to_string(),
            context: context.annotated_context(),
            source_count: context.len(),
        };

        let sources = [PromptSource::Template, PromptSource::Synthesized];
        let rendered = first_success(&sources, |_, source| {
            let source = *source;
            let vars = &vars;
            async move {
                match source {
                    PromptSource::Template => self.render(vars).await.map(|m| (m, false)),
                    PromptSource::Synthesized => Ok((vec![synthesize(query, context)], true)),
                }
            }
        })
        .await;

        let (prompt_messages, synthesized) =
            rendered.unwrap_or_else(|_| (vec![synthesize(query, context)], true));

        AssembledPrompt {
            messages: merge(&self.default_system, history, prompt_messages),
            synthesized,
        }
    }

    /// The reduced prompt used by the secondary run: no history, no template.
    pub fn assemble_synthesized(&self, query: &str, context: &EnrichedContext) -> AssembledPrompt {
        AssembledPrompt {
            messages: merge(&self.default_system, &[], vec![synthesize(query, context)]),
            synthesized: true,
        }
    }

    async fn render(&self, vars: &TemplateVars) -> Result<Vec<Message>, TemplateError> {
        let template = self
            .template
            .as_ref()
            .ok_or_else(|| TemplateError::Unavailable("no prompt template configured".into()))?;

        let result = match template.render(vars).await {
            Ok(messages) if messages.is_empty() => Err(TemplateError::Empty),
            other => other,
        };

        match &result {
            Ok(messages) => {
                debug!(template = %template.name(), messages = messages.len(), "Prompt template rendered")
            }
            Err(e) => {
                warn!(template = %template.name(), error = %e, "Prompt template failed, synthesizing prompt")
            }
        }
        result
    }
}

/// Build `[system] + history + prompt`, with exactly one system message first.
///
/// The prompt's own system message wins over the default; any other
/// system-role messages in either list are dropped.
pub fn merge(default_system: &str, history: &[Message], prompt: Vec<Message>) -> Vec<Message> {
    let system = prompt
        .iter()
        .find(|m| m.is_system())
        .cloned()
        .unwrap_or_else(|| Message::system(default_system));

    let mut messages = Vec::with_capacity(1 + history.len() + prompt.len());
    messages.push(system);
    messages.extend(history.iter().filter(|m| !m.is_system()).cloned());
    messages.extend(prompt.into_iter().filter(|m| !m.is_system()));
    messages
}

/// A single user message embedding the raw query and all passage text.
pub fn synthesize(query: &str, context: &EnrichedContext) -> Message {
    let context_text = if context.is_empty() {
        "(no documents were retrieved)".to_string()
    } else {
        context.annotated_context()
    };
    Message::user(format!(
        "Answer the question below. Use the context when it is relevant and cite it with the \
         marker that precedes each passage.\n\nQuestion: {query}\n\nContext:\n{context_text}"
    ))
}

/// System instruction plus a user message with the annotated context and question.
pub struct StandardTemplate {
    system_prompt: String,
}

impl StandardTemplate {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }
}

#[async_trait]
impl PromptTemplate for StandardTemplate {
    fn name(&self) -> &str {
        "standard"
    }

    async fn render(&self, vars: &TemplateVars) -> Result<Vec<Message>, TemplateError> {
        let user = if vars.source_count == 0 {
            format!(
                "No documents matched this question. Answer from general knowledge and say so.\n\n\
                 Question: {}",
                vars.query
            )
        } else {
            format!(
                "Use these {} sources to answer.\n\n{}\n\nQuestion: {}",
                vars.source_count, vars.context, vars.query
            )
        };
        Ok(vec![Message::system(&self.system_prompt), Message::user(user)])
    }
}
