//! Give each selected passage its citation ordinal.
//!
//! Ordinals are assigned after final selection, by position, so they are
//! stable for one response only. The structured metadata sent to the
//! caller and the inline marker embedded in the prompt are derived from the
//! same [`CitedPassage`], which keeps the two in agreement.

use ragstream_core::passage::{Passage, SourceMetadata};

/// A selected passage and its citation ordinal.
#[derive(Debug, Clone, PartialEq)]
pub struct CitedPassage {
    pub ordinal: usize,
    pub passage: Passage,
}

impl CitedPassage {
    /// The marker the model is asked to reproduce when citing this passage.
    pub fn marker(&self) -> String {
        format!(
            "[Source: {}, Chunk: {}]",
            self.passage.source_file_name, self.ordinal
        )
    }

    /// Passage text prefixed with its marker, for embedding in the prompt.
    pub fn annotated_text(&self) -> String {
        format!("{}\n{}", self.marker(), self.passage.text)
    }

    /// Metadata for the `sources` event.
    pub fn metadata(&self) -> SourceMetadata {
        SourceMetadata {
            document_id: self.passage.document_id.clone(),
            ordinal: self.ordinal,
            source_file_name: self.passage.source_file_name.clone(),
            page_number: self.passage.page_number,
            relevance_score: self.passage.relevance_score,
        }
    }
}

/// The selected passages of one run, in selection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichedContext {
    pub passages: Vec<CitedPassage>,
}

impl EnrichedContext {
    /// Assign ordinals 0..n in selection order.
    pub fn enrich(selected: Vec<Passage>) -> Self {
        let passages = selected
            .into_iter()
            .enumerate()
            .map(|(ordinal, passage)| CitedPassage { ordinal, passage })
            .collect();
        Self { passages }
    }

    pub fn sources(&self) -> Vec<SourceMetadata> {
        self.passages.iter().map(CitedPassage::metadata).collect()
    }

    /// All annotated passages, separated by blank lines.
    pub fn annotated_context(&self) -> String {
        self.passages
            .iter()
            .map(CitedPassage::annotated_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}
