//! Ordered fallback chains: attempt each strategy in turn, first success wins.
//!
//! Used for the reranker chain, the prompt-template fallback and the
//! transport's JSON recovery tiers. Strategies after the first success are
//! never attempted. On total failure every error is returned, in order.

use std::future::Future;

/// Try `strategies` in order with an async `attempt`.
pub async fn first_success<S, T, E, F, Fut>(
    strategies: &[S],
    mut attempt: F,
) -> std::result::Result<T, Vec<E>>
where
    F: FnMut(usize, &S) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let mut failures = Vec::with_capacity(strategies.len());
    for (i, strategy) in strategies.iter().enumerate() {
        match attempt(i, strategy).await {
            Ok(value) => return Ok(value),
            Err(e) => failures.push(e),
        }
    }
    Err(failures)
}

/// Synchronous counterpart of [`first_success`].
pub fn first_ok<S, T, E, F>(strategies: &[S], mut attempt: F) -> std::result::Result<T, Vec<E>>
where
    F: FnMut(&S) -> std::result::Result<T, E>,
{
    let mut failures = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        match attempt(strategy) {
            Ok(value) => return Ok(value),
            Err(e) => failures.push(e),
        }
    }
    Err(failures)
}
