//! Concurrency control for run submission

use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds how many runs execute at once
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl ConcurrencyLimiter {
    /// Create a new concurrency limiter
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Acquire a permit that can move into a spawned task
    #[tracing::instrument(
        name = "concurrency.acquire",
        skip(self),
        fields(
            max_concurrent = %self.max_concurrent,
            available_before = tracing::field::Empty,
            wait_duration_ms = tracing::field::Empty,
        )
    )]
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        let span = tracing::Span::current();
        span.record("available_before", self.semaphore.available_permits());

        let start = Instant::now();
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| Error::Internal(format!("run limiter closed: {e}")))?;

        span.record("wait_duration_ms", start.elapsed().as_millis() as u64);
        Ok(permit)
    }

    /// Get the maximum concurrent runs
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Get the current available permits
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
