//! Session-scoped similarity search that seeds a run.

use std::sync::Arc;
use std::time::Duration;

use ragstream_core::error::RetrievalError;
use ragstream_core::passage::{Passage, SessionFilter};
use ragstream_core::retrieval::RetrievalStore;
use tracing::{debug, info};

/// Issues the candidate search against the injected retrieval store.
pub struct QueryRetriever {
    store: Arc<dyn RetrievalStore>,
    candidate_count: usize,
    timeout: Duration,
}

impl QueryRetriever {
    pub fn new(store: Arc<dyn RetrievalStore>, candidate_count: usize, timeout: Duration) -> Self {
        Self {
            store,
            candidate_count,
            timeout,
        }
    }

    /// Fetch up to K candidates in store order, scoped to `session_id` when present.
    ///
    /// Each passage's `chunk_ordinal` is set to its position in the returned list.
    /// Store failures and timeouts are fatal to the run.
    pub async fn retrieve(
        &self,
        query: &str,
        session_id: Option<&str>,
    ) -> Result<Vec<Passage>, RetrievalError> {
        let filter = session_id.map(|id| SessionFilter {
            session_id: id.to_string(),
        });

        debug!(
            store = %self.store.name(),
            k = self.candidate_count,
            session = session_id.unwrap_or("-"),
            "Retrieving candidates"
        );

        let search = self
            .store
            .search(query, self.candidate_count, filter.as_ref());
        let mut passages = match tokio::time::timeout(self.timeout, search).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RetrievalError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        passages.truncate(self.candidate_count);
        for (i, passage) in passages.iter_mut().enumerate() {
            passage.chunk_ordinal = i;
        }

        info!(candidates = passages.len(), "Retrieval complete");
        Ok(passages)
    }
}
