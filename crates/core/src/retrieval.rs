//! Retrieval store and reranker traits.
//!
//! Implementations (vector databases, cross-encoder services, LLM judges)
//! live outside this workspace; the pipeline only sees these traits.

use async_trait::async_trait;

use crate::error::{RerankError, RetrievalError};
use crate::passage::{Passage, SessionFilter};

/// Similarity search over the per-session document store.
#[async_trait]
pub trait RetrievalStore: Send + Sync {
    /// The store name (e.g. "qdrant", "pgvector").
    fn name(&self) -> &str;

    /// Return up to `k` passages, most similar first.
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SessionFilter>,
    ) -> std::result::Result<Vec<Passage>, RetrievalError>;
}

/// A backend that reorders and filters passages by relevance to a query.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// The identifier used in the configured reranker order.
    fn name(&self) -> &str;

    /// Return at most `k` passages, most relevant first.
    async fn rerank(
        &self,
        query: &str,
        passages: &[Passage],
        k: usize,
    ) -> std::result::Result<Vec<Passage>, RerankError>;
}
