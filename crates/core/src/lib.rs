//! # ragstream core
//!
//! Domain types, collaborator traits, and error definitions for the
//! ragstream retrieval-augmented generation pipeline. This crate has
//! **no framework dependencies**: it defines the model every other crate
//! implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (retrieval store, reranker, generation
//! backend, prompt template, event sink) is a trait here. Concrete
//! implementations are injected into the pipeline, which keeps test
//! doubles trivial and the dependency graph pointing inward.

pub mod chain;
pub mod error;
pub mod event;
pub mod message;
pub mod passage;
pub mod provider;
pub mod retrieval;
pub mod template;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{EventSink, GenerationResult, SinkClosed, StreamEvent};
pub use message::{Message, Part, Query, Role, TemperaturePreset};
pub use passage::{Passage, SessionFilter, SourceMetadata};
pub use provider::{
    Chunk, FinalResult, GenerationBackend, GenerationConfig, GenerationRequest, GenerationStream,
    ToolDefinition, ToolRequest, ToolResponse,
};
pub use retrieval::{Reranker, RetrievalStore};
pub use template::{PromptTemplate, TemplateVars};
pub use tool::{BuiltinTool, ToolInvocationRecord, ToolRegistry};
