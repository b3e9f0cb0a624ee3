//! Reranker selection — narrow candidates to the final set.
//!
//! Configured reranker identifiers are tried strictly in order; the first
//! backend that succeeds decides the selection and later ones are never
//! called. If every backend fails, the first N candidates are kept in their
//! original order. Selection never fails.
//!
//! The caller's cancellation token is checked before each attempt and
//! races the attempt itself; once it fires no further backend is called.

use std::sync::Arc;
use std::time::Duration;

use ragstream_core::chain::first_success;
use ragstream_core::error::RerankError;
use ragstream_core::passage::Passage;
use ragstream_core::retrieval::Reranker;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One position in the configured reranker order.
struct RerankEntry {
    id: String,
    backend: Option<Arc<dyn Reranker>>,
}

/// How the final passages were chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMethod {
    /// Candidates already fit; no backend was called.
    Passthrough,
    /// The named reranker succeeded.
    Reranked(String),
    /// Every reranker failed; candidates were truncated in original order.
    Truncated,
}

/// The outcome of [`RerankerSelector::select`].
#[derive(Debug, Clone)]
pub struct Selection {
    pub passages: Vec<Passage>,
    pub method: SelectionMethod,
}

/// Narrows candidates with an ordered list of reranking backends.
pub struct RerankerSelector {
    chain: Vec<RerankEntry>,
    final_count: usize,
    timeout: Duration,
}

impl RerankerSelector {
    /// Build the chain from configured identifiers and the available backends.
    ///
    /// Identifiers without a matching backend stay in the chain and fail
    /// when reached, so a misconfigured order is visible in the logs.
    pub fn new(
        order: &[String],
        backends: &[Arc<dyn Reranker>],
        final_count: usize,
        timeout: Duration,
    ) -> Self {
        let chain = order
            .iter()
            .map(|id| RerankEntry {
                id: id.clone(),
                backend: backends.iter().find(|b| b.name() == id.as_str()).cloned(),
            })
            .collect();

        Self {
            chain,
            final_count,
            timeout,
        }
    }

    pub fn final_count(&self) -> usize {
        self.final_count
    }

    /// Select at most N passages for the prompt.
    pub async fn select(
        &self,
        query: &str,
        candidates: Vec<Passage>,
        cancel: &CancellationToken,
    ) -> Selection {
        let n = self.final_count;

        if candidates.len() <= n {
            debug!(candidates = candidates.len(), n, "Candidates fit, skipping rerank");
            return Selection {
                passages: candidates,
                method: SelectionMethod::Passthrough,
            };
        }

        let total = self.chain.len();
        let timeout = self.timeout;
        let candidates_ref = &candidates;
        let attempt = first_success(&self.chain, |i, entry| {
            let id = entry.id.clone();
            let backend = entry.backend.clone();
            async move {
                if cancel.is_cancelled() {
                    return Err(RerankError::Cancelled);
                }
                info!(reranker = %id, attempt = i + 1, total, "Rerank: trying backend");
                let call = attempt_backend(backend, id.clone(), query, candidates_ref, n, timeout);
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(RerankError::Cancelled),
                    result = call => result,
                };
                if let Err(e) = &result {
                    warn!(reranker = %id, error = %e, "Rerank: backend failed, trying next");
                }
                result
            }
        })
        .await;

        match attempt {
            Ok((id, passages)) => {
                info!(reranker = %id, selected = passages.len(), "Rerank: backend succeeded");
                Selection {
                    passages,
                    method: SelectionMethod::Reranked(id),
                }
            }
            Err(failures) => {
                if cancel.is_cancelled() {
                    debug!(n, "Rerank: cancelled, truncating");
                } else {
                    let err = RerankError::AllRerankersFailed {
                        attempts: failures.len(),
                    };
                    warn!(error = %err, n, "Rerank: falling back to truncation");
                }
                let mut passages = candidates;
                passages.truncate(n);
                Selection {
                    passages,
                    method: SelectionMethod::Truncated,
                }
            }
        }
    }
}

/// Call one backend with a timeout and cap its answer at `n`.
async fn attempt_backend(
    backend: Option<Arc<dyn Reranker>>,
    id: String,
    query: &str,
    candidates: &[Passage],
    n: usize,
    timeout: Duration,
) -> Result<(String, Vec<Passage>), RerankError> {
    let backend = backend.ok_or_else(|| RerankError::NotRegistered(id.clone()))?;

    let mut ranked = match tokio::time::timeout(timeout, backend.rerank(query, candidates, n)).await
    {
        Ok(result) => result?,
        Err(_) => {
            return Err(RerankError::Timeout {
                backend: id,
                timeout_secs: timeout.as_secs(),
            });
        }
    };

    if ranked.is_empty() {
        return Err(RerankError::Failed {
            backend: id,
            reason: "returned no passages".into(),
        });
    }
    ranked.truncate(n);
    Ok((id, ranked))
}
