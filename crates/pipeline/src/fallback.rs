//! Fallback controller: one secondary attempt after a fatal primary failure.
//!
//! The secondary run keeps only the original query and the passages
//! already selected. It has no history, no template and no tools. If it
//! fails too, the response becomes a readable error description so the
//! caller still receives a `final_response`.

use ragstream_core::error::{Error, GenerationError};
use ragstream_core::event::StreamEvent;
use ragstream_core::provider::{GenerationConfig, GenerationRequest};
use tracing::{error, info, warn};

use crate::citation::EnrichedContext;
use crate::emitter::EventEmitter;
use crate::generation::{GenerationOrchestrator, GenerationOutcome};
use crate::prompt::PromptAssembler;

/// Prefix of the response text when both runs fail.
pub const FAILURE_PREFIX: &str = "Error: RAG service encountered an issue.";

pub struct FallbackController<'a> {
    assembler: &'a PromptAssembler,
    orchestrator: &'a GenerationOrchestrator,
}

impl<'a> FallbackController<'a> {
    pub fn new(assembler: &'a PromptAssembler, orchestrator: &'a GenerationOrchestrator) -> Self {
        Self {
            assembler,
            orchestrator,
        }
    }

    /// Report `primary` to the caller and try the reduced secondary run.
    ///
    /// Never fails: the returned outcome always carries a response text.
    pub async fn recover(
        &self,
        primary: &Error,
        query: &str,
        context: &EnrichedContext,
        config: GenerationConfig,
        emitter: &EventEmitter,
    ) -> GenerationOutcome {
        warn!(error = %primary, passages = context.len(), "Primary run failed, attempting secondary");
        emitter.emit(StreamEvent::error(primary.to_string()));

        let prompt = self.assembler.assemble_synthesized(query, context);
        let request = GenerationRequest {
            messages: prompt.messages,
            tools: Vec::new(),
            config,
        };

        match self.orchestrator.generate(request, emitter).await {
            Ok(outcome) => {
                info!(chars = outcome.text.len(), "Secondary run succeeded");
                outcome
            }
            Err(secondary) => {
                error!(primary = %primary, secondary = %secondary, "Secondary run failed");
                emitter.emit(StreamEvent::error(secondary.to_string()));
                GenerationOutcome {
                    text: failure_text(primary, &secondary),
                    ..GenerationOutcome::default()
                }
            }
        }
    }
}

/// The best-effort response text when both runs failed.
pub fn failure_text(primary: &Error, secondary: &GenerationError) -> String {
    format!("{FAILURE_PREFIX} {primary}. Retry without tools also failed: {secondary}")
}
