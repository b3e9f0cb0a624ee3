//! The retrieval-augmented generation pipeline.
//!
//! A run follows a fixed sequence of stages:
//!
//! 1. **Retrieve** up to K candidates from the session's document store
//! 2. **Select** at most N of them through the ordered reranker chain
//! 3. **Cite**: assign ordinals and publish the `sources` event
//! 4. **Assemble** the prompt from one system message, trimmed history and the template
//! 5. **Generate**, forwarding text deltas and reconciling tool calls
//! 6. **Finish** with a `final_response`, after one secondary attempt if a fatal stage failed
//!
//! Reranker and template failures degrade in place; retrieval and
//! generation failures go to the fallback controller.

pub mod citation;
pub mod correlation;
pub mod emitter;
pub mod fallback;
pub mod generation;
pub mod history;
pub mod pipeline;
pub mod prompt;
pub mod rerank;
pub mod retriever;
pub mod token;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use citation::{CitedPassage, EnrichedContext};
pub use correlation::ToolCorrelationTable;
pub use emitter::EventEmitter;
pub use fallback::{FAILURE_PREFIX, FallbackController};
pub use generation::{GenerationOrchestrator, GenerationOutcome, GenerationState};
pub use history::HistoryTrimmer;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use prompt::{AssembledPrompt, PromptAssembler, StandardTemplate};
pub use rerank::{RerankerSelector, Selection, SelectionMethod};
pub use retriever::QueryRetriever;
