//! Global bound on in-flight utterance pipelines.
//!
//! A fixed pool of slots is shared by all sessions. When the pool is empty,
//! an utterance waits in a bounded queue for a short grace period; if no
//! slot frees in time, or the queue itself is full, the utterance is
//! rejected with `CapacityExceeded`. Rejecting late arrivals protects the
//! tail latency of work already admitted.

use crate::config::LimiterSettings;
use crate::error::{LingolinkError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Point-in-time limiter occupancy, for the monitoring surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LimiterOccupancy {
    pub in_flight: usize,
    pub queued: usize,
    pub max_concurrent: usize,
    pub queue_depth: usize,
}

/// A held concurrency slot. Dropping it returns the slot to the pool.
pub struct ConcurrencySlot {
    _permit: OwnedSemaphorePermit,
}

/// Bounds total in-flight utterance pipelines across all sessions.
pub struct ConcurrencyLimiter {
    slots: Arc<Semaphore>,
    queued: Arc<AtomicUsize>,
    max_concurrent: usize,
    queue_depth: usize,
    grace: Duration,
}

impl ConcurrencyLimiter {
    pub fn new(settings: &LimiterSettings) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(settings.max_concurrent_streams)),
            queued: Arc::new(AtomicUsize::new(0)),
            max_concurrent: settings.max_concurrent_streams,
            queue_depth: settings.effective_queue_depth(),
            grace: Duration::from_millis(settings.queue_grace_ms),
        }
    }

    /// Acquires a slot, waiting up to the grace period if the pool is
    /// empty. Fails with `CapacityExceeded` when the queue is full or the
    /// grace period elapses without a free slot.
    pub async fn acquire(&self) -> Result<ConcurrencySlot> {
        if let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() {
            return Ok(ConcurrencySlot { _permit: permit });
        }

        let queued = self.queued.fetch_add(1, Ordering::SeqCst);
        if queued >= self.queue_depth {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            warn!(queued, queue_depth = self.queue_depth, "capacity queue full");
            return Err(self.capacity_error());
        }

        debug!(queued = queued + 1, "waiting for a concurrency slot");
        let waited = tokio::time::timeout(self.grace, Arc::clone(&self.slots).acquire_owned()).await;
        self.queued.fetch_sub(1, Ordering::SeqCst);

        match waited {
            Ok(Ok(permit)) => Ok(ConcurrencySlot { _permit: permit }),
            // The semaphore is never closed while the limiter is alive.
            Ok(Err(_)) => Err(self.capacity_error()),
            Err(_) => {
                warn!(grace_ms = self.grace.as_millis() as u64, "grace period elapsed");
                Err(self.capacity_error())
            }
        }
    }

    pub fn occupancy(&self) -> LimiterOccupancy {
        LimiterOccupancy {
            in_flight: self.max_concurrent - self.slots.available_permits(),
            queued: self.queued.load(Ordering::SeqCst),
            max_concurrent: self.max_concurrent,
            queue_depth: self.queue_depth,
        }
    }

    fn capacity_error(&self) -> LingolinkError {
        LingolinkError::CapacityExceeded {
            in_flight: self.max_concurrent - self.slots.available_permits(),
            queued: self.queued.load(Ordering::SeqCst),
        }
    }
}
