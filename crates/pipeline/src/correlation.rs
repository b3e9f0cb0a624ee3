//! Tool-call correlation for one generation call.
//!
//! Requests wait in the table under their correlation reference until the
//! response with the same reference arrives. The table lives for exactly
//! one generation call and is drained explicitly when the call ends.

use std::collections::{HashMap, HashSet};

use ragstream_core::message::{Message, Part};
use ragstream_core::provider::{Chunk, ToolRequest, ToolResponse};
use ragstream_core::tool::ToolInvocationRecord;
use tracing::{debug, warn};

/// Name recorded for a response whose request was never observed.
pub const UNKNOWN_TOOL: &str = "unknown_tool";

/// Pending tool requests keyed by correlation reference.
#[derive(Debug, Default)]
pub struct ToolCorrelationTable {
    pending: HashMap<String, ToolRequest>,
    resolved: HashSet<String>,
    records: Vec<ToolInvocationRecord>,
}

impl ToolCorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the tool parts of one streamed chunk. Returns the number of
    /// invocations completed by it.
    pub fn observe_chunk(&mut self, chunk: &Chunk) -> usize {
        let before = self.records.len();
        for request in &chunk.tool_requests {
            self.insert(request.clone());
        }
        for response in &chunk.tool_responses {
            self.resolve(response.clone());
        }
        self.records.len() - before
    }

    /// Fold tool parts that only appear in the aggregated transcript.
    ///
    /// References already resolved from streamed chunks are ignored, so a
    /// backend that reports a call in both places yields one record.
    pub fn observe_transcript(&mut self, messages: &[Message]) -> usize {
        let before = self.records.len();
        for part in messages.iter().flat_map(|m| m.content.iter()) {
            match part {
                Part::ToolRequest {
                    reference,
                    name,
                    input,
                } => self.insert(ToolRequest {
                    reference: reference.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                Part::ToolResponse {
                    reference,
                    name,
                    output,
                } => self.resolve(ToolResponse {
                    reference: reference.clone(),
                    name: name.clone(),
                    output: output.clone(),
                    error: None,
                }),
                Part::Text { .. } => {}
            }
        }
        self.records.len() - before
    }

    /// Store a request until its response arrives.
    pub fn insert(&mut self, request: ToolRequest) {
        if self.resolved.contains(&request.reference) {
            return;
        }
        debug!(reference = %request.reference, tool = %request.name, "Tool request pending");
        self.pending.insert(request.reference.clone(), request);
    }

    /// Match a response to its pending request and record the invocation.
    ///
    /// A response with no pending request is still recorded, under
    /// [`UNKNOWN_TOOL`] unless the response names its tool.
    pub fn resolve(&mut self, response: ToolResponse) {
        if !self.resolved.insert(response.reference.clone()) {
            return;
        }

        let record = match self.pending.remove(&response.reference) {
            Some(request) => ToolInvocationRecord {
                name: request.name,
                input: request.input,
                output: response.output,
                error: response.error,
            },
            None => {
                warn!(reference = %response.reference, "Tool response without a matching request");
                ToolInvocationRecord {
                    name: response.name.unwrap_or_else(|| UNKNOWN_TOOL.to_string()),
                    input: serde_json::Value::Null,
                    output: response.output,
                    error: response.error,
                }
            }
        };
        self.records.push(record);
    }

    /// Requests still waiting for a response.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn records(&self) -> &[ToolInvocationRecord] {
        &self.records
    }

    /// End the table's lifetime: return the completed invocations and
    /// discard any request that never got a response.
    pub fn drain(mut self) -> Vec<ToolInvocationRecord> {
        for (reference, request) in self.pending.drain() {
            warn!(reference = %reference, tool = %request.name, "Tool request never resolved, discarding");
        }
        self.records
    }
}
