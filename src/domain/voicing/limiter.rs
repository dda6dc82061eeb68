use futures::stream::{self, StreamExt};
use std::future::Future;

/// Runs an async operation over a list of items with at most `limit`
/// operations in flight. Results come back in input order, one per item,
/// regardless of which operation finished first.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyLimiter {
    limit: usize,
}

impl ConcurrencyLimiter {
    /// A limit of zero is treated as one
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub async fn run<T, R, E, F, Fut>(&self, items: Vec<T>, operation: F) -> Vec<Result<R, E>>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        stream::iter(items)
            .map(operation)
            .buffered(self.limit)
            .collect()
            .await
    }
}
