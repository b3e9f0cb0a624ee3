//! Retrieved passages and the metadata sent to callers for citations.

use serde::{Deserialize, Serialize};

/// A retrieved chunk of source-document text plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passage {
    pub document_id: String,

    /// Position within the candidate list at selection time
    pub chunk_ordinal: usize,

    pub source_file_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,

    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
}

impl Passage {
    pub fn new(
        document_id: impl Into<String>,
        source_file_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            chunk_ordinal: 0,
            source_file_name: source_file_name.into(),
            page_number: None,
            text: text.into(),
            relevance_score: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page_number = Some(page);
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.relevance_score = Some(score);
        self
    }
}

/// Restricts a similarity search to one session's documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFilter {
    pub session_id: String,
}

/// Citation metadata for one selected passage, as carried by the `sources` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    pub document_id: String,

    /// Citation ordinal; matches the `Chunk: <n>` marker in the prompt
    pub ordinal: usize,

    pub source_file_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
}
