//! Admission gate for remote-read requests.
//!
//! A counting semaphore bounding how many remote-read requests are processed
//! at once. Acquisition waits until a slot frees up or the request context
//! is done; a done context never consumes a slot. The permit releases its
//! slot when dropped, so every exit path of a handler releases exactly once.
//!
//! The `api.remote_read_queries` gauge is incremented on acquire and
//! decremented when the permit drops.

use crate::core::context::{ContextError, RequestContext};
use crate::ops::observability::ApiMetrics;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Gate acquisition failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("context canceled while waiting for admission")]
    Canceled,
    #[error("context deadline exceeded while waiting for admission")]
    DeadlineExceeded,
    #[error("admission gate closed")]
    Closed,
}

impl From<ContextError> for GateError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => Self::Canceled,
            ContextError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Bounded admission with a published in-flight gauge.
#[derive(Debug)]
pub struct AdmissionGate {
    semaphore: Semaphore,
    capacity: usize,
    in_flight: AtomicUsize,
    metrics: Arc<ApiMetrics>,
}

impl AdmissionGate {
    /// Create a gate admitting at most `capacity` holders (minimum 1).
    pub fn new(capacity: usize, metrics: Arc<ApiMetrics>) -> Self {
        let capacity = capacity.max(1);
        metrics.set_remote_read_queries(0);
        Self {
            semaphore: Semaphore::new(capacity),
            capacity,
            in_flight: AtomicUsize::new(0),
            metrics,
        }
    }

    /// Wait for a slot or for the context to finish.
    pub async fn acquire(&self, ctx: &RequestContext) -> Result<GatePermit<'_>, GateError> {
        ctx.check()?;
        let permit = tokio::select! {
            biased;
            err = ctx.done() => return Err(err.into()),
            permit = self.semaphore.acquire() => permit.map_err(|_| GateError::Closed)?,
        };

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        self.metrics.remote_read_query_started();

        Ok(GatePermit {
            _permit: permit,
            gate: self,
        })
    }

    /// Maximum concurrent holders.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current holders.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Free slots.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Reject all current and future waiters.
    pub fn close(&self) {
        self.semaphore.close();
    }

    fn release(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                Some(v.saturating_sub(1))
            });
        self.metrics.remote_read_query_finished();
    }
}

/// A held slot; released on drop.
#[derive(Debug)]
pub struct GatePermit<'a> {
    _permit: SemaphorePermit<'a>,
    gate: &'a AdmissionGate,
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
