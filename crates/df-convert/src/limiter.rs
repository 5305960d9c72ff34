//! FIFO admission control for conversion jobs.
//!
//! A [`JobLimiter`] hands out at most `capacity` [`JobSlot`]s at a time.
//! Callers beyond that are suspended in [`JobLimiter::acquire`] and resumed in
//! the order they arrived. Dropping a slot releases it, so a slot is returned
//! on every exit path of the protected work, including panics.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use df_core::{Error, Result};

#[derive(Debug)]
struct LimiterState {
    /// Fair semaphore; permits are granted in request order.
    semaphore: Arc<Semaphore>,
    capacity: usize,
    active: AtomicUsize,
    waiting: AtomicUsize,
}

/// Bounds how many conversions run at once.
///
/// Cheap to clone; clones share the same slots.
#[derive(Debug, Clone)]
pub struct JobLimiter {
    state: Arc<LimiterState>,
}

impl JobLimiter {
    /// Create a limiter with `capacity` slots. Zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Arc::new(LimiterState {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                active: AtomicUsize::new(0),
                waiting: AtomicUsize::new(0),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity
    }

    /// Number of slots currently held.
    pub fn active(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Number of callers suspended in [`acquire`](Self::acquire).
    pub fn waiting(&self) -> usize {
        self.state.waiting.load(Ordering::SeqCst)
    }

    /// Wait for a free slot.
    ///
    /// Never rejects; the wait is unbounded. The returned guard releases the
    /// slot when dropped and wakes the longest-waiting caller, if any.
    ///
    /// # Errors
    ///
    /// Only fails if the underlying semaphore was closed, which this type
    /// never does.
    pub async fn acquire(&self) -> Result<JobSlot> {
        let permit = {
            let _waiting = WaitingGuard::enter(&self.state.waiting);
            self.state
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| Error::Internal("job limiter closed".into()))?
        };

        let active = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        debug_assert!(active <= self.state.capacity);

        Ok(JobSlot {
            state: Arc::clone(&self.state),
            _permit: permit,
        })
    }

    /// Run `work` while holding a slot.
    pub async fn run<F>(&self, work: F) -> Result<F::Output>
    where
        F: Future,
    {
        let _slot = self.acquire().await?;
        Ok(work.await)
    }
}

/// A held concurrency slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct JobSlot {
    state: Arc<LimiterState>,
    // Dropped after `Drop::drop` runs, so `active` is decremented before the
    // next waiter can be admitted.
    _permit: OwnedSemaphorePermit,
}

impl Drop for JobSlot {
    fn drop(&mut self) {
        self.state.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Counts a caller as waiting for as long as the acquire future is alive.
struct WaitingGuard<'a>(&'a AtomicUsize);

impl<'a> WaitingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
