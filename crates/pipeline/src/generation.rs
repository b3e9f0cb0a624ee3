//! Generation orchestrator — consume one streaming generation call.
//!
//! Per call: `Idle → Streaming → Reconciling → Done`, or `Failed` when the
//! chunk stream or the final result errors. Text deltas are forwarded as
//! they arrive; tool requests and responses are matched through a
//! [`ToolCorrelationTable`] that lives only for this call.

use std::sync::Arc;

use ragstream_core::error::GenerationError;
use ragstream_core::event::StreamEvent;
use ragstream_core::provider::{Chunk, FinalResult, GenerationBackend, GenerationRequest};
use ragstream_core::tool::ToolInvocationRecord;
use tracing::{debug, info, warn};

use crate::correlation::ToolCorrelationTable;
use crate::emitter::EventEmitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Streaming,
    Reconciling,
    Done,
    Failed,
}

/// What one generation call produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOutcome {
    pub text: String,
    pub tool_invocations: Vec<ToolInvocationRecord>,

    /// The caller cancelled before the call finished; `text` is partial
    pub cancelled: bool,
}

/// Drives a [`GenerationBackend`] and reconciles its tool calls.
pub struct GenerationOrchestrator {
    backend: Arc<dyn GenerationBackend>,
}

impl GenerationOrchestrator {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Run one generation call, emitting `chunk` and `tool_invocations` events.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        emitter: &EventEmitter,
    ) -> Result<GenerationOutcome, GenerationError> {
        let mut run = GenerationRun::new(emitter);
        let result = run.drive(self.backend.as_ref(), request).await;
        if let Err(e) = &result {
            run.transition(GenerationState::Failed);
            warn!(backend = %self.backend.name(), error = %e, "Generation failed");
        }
        result
    }
}

/// Mutable state of a single call.
struct GenerationRun<'a> {
    emitter: &'a EventEmitter,
    state: GenerationState,
    table: ToolCorrelationTable,
    accumulated: String,
}

impl<'a> GenerationRun<'a> {
    fn new(emitter: &'a EventEmitter) -> Self {
        Self {
            emitter,
            state: GenerationState::Idle,
            table: ToolCorrelationTable::new(),
            accumulated: String::new(),
        }
    }

    fn transition(&mut self, next: GenerationState) {
        debug!(from = ?self.state, to = ?next, "Generation state");
        self.state = next;
    }

    async fn drive(
        &mut self,
        backend: &dyn GenerationBackend,
        request: GenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        if self.emitter.is_cancelled() {
            return Ok(self.cancelled());
        }

        info!(
            backend = %backend.name(),
            model = %request.config.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Generation: starting stream"
        );
        let mut stream = backend.generate_stream(request).await?;
        self.transition(GenerationState::Streaming);

        let cancel = self.emitter.cancellation().clone();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.cancelled()),
                next = stream.chunks.recv() => next,
            };
            match next {
                Some(Ok(chunk)) => self.on_chunk(&chunk),
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }

        self.transition(GenerationState::Reconciling);
        let final_result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(self.cancelled()),
            result = stream.final_result => result?,
        };
        self.on_final(final_result);

        let tool_invocations = std::mem::take(&mut self.table).drain();
        if !tool_invocations.is_empty() {
            self.emitter.emit(StreamEvent::ToolInvocations {
                invocations: tool_invocations.clone(),
            });
        }

        self.transition(GenerationState::Done);
        info!(
            chars = self.accumulated.len(),
            tool_invocations = tool_invocations.len(),
            "Generation complete"
        );
        Ok(GenerationOutcome {
            text: std::mem::take(&mut self.accumulated),
            tool_invocations,
            cancelled: false,
        })
    }

    fn on_chunk(&mut self, chunk: &Chunk) {
        if let Some(text) = chunk.text.as_deref().filter(|t| !t.is_empty()) {
            self.accumulated.push_str(text);
            self.emitter.emit(StreamEvent::TextDelta {
                text: text.to_string(),
            });
        }
        self.table.observe_chunk(chunk);
    }

    /// Fold transcript-only tool calls, and fall back to the final text
    /// when nothing was streamed.
    fn on_final(&mut self, final_result: FinalResult) {
        let folded = self.table.observe_transcript(&final_result.messages);
        if folded > 0 {
            debug!(folded, "Tool calls reconciled from final transcript");
        }

        if self.accumulated.is_empty() && !final_result.text.is_empty() {
            debug!("No streamed text, emitting final text once");
            self.emitter.emit(StreamEvent::TextDelta {
                text: final_result.text.clone(),
            });
            self.accumulated = final_result.text;
        }
    }

    fn cancelled(&mut self) -> GenerationOutcome {
        info!(chars = self.accumulated.len(), "Generation cancelled by caller");
        self.transition(GenerationState::Failed);
        GenerationOutcome {
            text: std::mem::take(&mut self.accumulated),
            tool_invocations: std::mem::take(&mut self.table).drain(),
            cancelled: true,
        }
    }
}
