//! Shared, priority-ordered gate in front of the translation engine.
//!
//! A [`RateLimiter`] bounds the number of in-flight engine calls and keeps a
//! minimum interval between the start of two calls. Waiting calls are
//! released most urgent first (lowest [`Priority`]), FIFO within a priority.
//!
//! The limiter is cheap to clone; every clone shares the same queue. It must
//! be used from within a tokio runtime.

use crate::error::{LocalizeError, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::trace;

/// Dispatch priority. Lower values are more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub i32);

impl Priority {
    /// User-triggered translation of a single entry
    pub const DIRECT_TRANSLATION: Priority = Priority(3);
    pub const DEFAULT: Priority = Priority(5);
    /// Background job translating many entries
    pub const BATCH_TRANSLATION: Priority = Priority(6);
    /// Re-propagation of changed entries
    pub const BATCH_UPDATE: Priority = Priority(7);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::DEFAULT
    }
}

/// Default maximum number of concurrent engine calls
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default minimum interval between two dispatch starts
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    max_concurrent: usize,
    min_interval: Duration,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    queue: BinaryHeap<Waiter>,
    running: usize,
    last_start: Option<Instant>,
    timer_armed: bool,
    seq: u64,
}

struct Waiter {
    priority: Priority,
    seq: u64,
    tx: oneshot::Sender<Permit>,
}

// BinaryHeap pops the greatest element: invert so the lowest priority value
// and then the oldest waiter come out first.
impl Ord for Waiter {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Waiter {}

/// A granted slot. The slot is released when the permit is dropped.
pub struct Permit {
    inner: Arc<Inner>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.inner.lock().running -= 1;
        self.inner.pump();
    }
}

impl RateLimiter {
    pub fn new(max_concurrent: usize, min_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_concurrent: max_concurrent.max(1),
                min_interval,
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    pub fn min_interval(&self) -> Duration {
        self.inner.min_interval
    }

    /// Wait for a slot at the given priority.
    pub async fn acquire(&self, priority: Priority) -> Result<Permit> {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.inner.lock();
            state.seq += 1;
            let seq = state.seq;
            state.queue.push(Waiter { priority, seq, tx });
            trace!(
                "Queued dispatch at priority {} ({} waiting)",
                priority.0,
                state.queue.len()
            );
        }
        self.inner.pump();

        rx.await
            .map_err(|_| LocalizeError::EngineFailure("rate limiter shut down".to_string()))
    }

    /// Run `task` once a slot is granted, holding the slot until it completes.
    pub async fn schedule<F, T>(&self, priority: Priority, task: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self.acquire(priority).await?;
        task.await
    }

    #[cfg(test)]
    fn queued(&self) -> usize {
        self.inner.lock().queue.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT, DEFAULT_MIN_INTERVAL)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Grant as many queued waiters as the bounds allow.
    fn pump(self: &Arc<Self>) {
        loop {
            let waiter = {
                let mut state = self.lock();
                if state.running >= self.max_concurrent {
                    return;
                }

                // waiters whose caller went away
                while state.queue.peek().is_some_and(|w| w.tx.is_closed()) {
                    state.queue.pop();
                }
                if state.queue.is_empty() {
                    return;
                }

                let now = Instant::now();
                if let Some(ready_at) = state.last_start.map(|t| t + self.min_interval) {
                    if now < ready_at {
                        if !state.timer_armed {
                            state.timer_armed = true;
                            self.wake_at(ready_at);
                        }
                        return;
                    }
                }

                let Some(waiter) = state.queue.pop() else {
                    return;
                };
                state.running += 1;
                state.last_start = Some(now);
                waiter
            };

            // Sent outside the lock: a failed send drops the permit, which
            // re-enters the lock to release its slot.
            let _ = waiter.tx.send(Permit {
                inner: Arc::clone(self),
            });
        }
    }

    fn wake_at(self: &Arc<Self>, at: Instant) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep_until(at).await;
            inner.lock().timer_armed = false;
            inner.pump();
        });
    }
}
