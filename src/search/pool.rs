//! Dispatch Pool
//!
//! Bounds how many backend calls run at once and how long each may take.
//! The pool is built once by the service and torn down explicitly:
//! `shutdown` refuses new work and waits, up to a limit, for calls already
//! running to finish.

use super::error::{DispatchFailure, SearchError, SearchResult};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Bounded pool shared by every federated search
pub struct DispatchPool {
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    call_timeout: Duration,
    closed: AtomicBool,
}

impl DispatchPool {
    pub fn new(max_concurrency: usize, call_timeout: Duration) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            call_timeout,
            closed: AtomicBool::new(false),
        }
    }

    /// Timeout applied when a call does not set its own
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Calls currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.max_concurrency - self.permits.available_permits().min(self.max_concurrency)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Run `call` once a slot is free, giving up after `timeout`
    ///
    /// The timeout covers the call only, not the wait for a slot.
    pub async fn run<F, T>(&self, timeout: Option<Duration>, call: F) -> Result<T, DispatchFailure>
    where
        F: Future<Output = T>,
    {
        if self.is_closed() {
            return Err(DispatchFailure::PoolClosed);
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DispatchFailure::PoolClosed)?;

        let timeout = timeout.unwrap_or(self.call_timeout);
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| DispatchFailure::Timeout(timeout))
    }

    /// Stop accepting calls and wait for running ones
    pub async fn shutdown(&self, timeout: Duration) -> SearchResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        tracing::info!(in_flight = self.in_flight(), "Shutting down dispatch pool");

        let all = u32::try_from(self.max_concurrency).unwrap_or(u32::MAX);
        let drained = tokio::time::timeout(timeout, self.permits.acquire_many(all)).await;
        self.permits.close();

        match drained {
            Ok(_) => {
                tracing::info!("Dispatch pool drained");
                Ok(())
            }
            Err(_) => {
                tracing::warn!(in_flight = self.in_flight(), "Dispatch pool shutdown timed out");
                Err(SearchError::ShutdownTimeout(timeout))
            }
        }
    }
}
