// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rate-limited work queues with per-key serialization.
//!
//! A [`WorkQueue`] hands each key to at most one worker at a time:
//!
//! - [`WorkQueue::get`] marks the key as processing
//! - adds of a processing key are coalesced and re-queued by [`WorkQueue::done`]
//! - adds of an already queued key are dropped
//!
//! Delayed adds go through a [`RateLimiter`]. The controller runs two queues
//! for service instances: a primary queue (per-key exponential backoff combined
//! with a global token bucket) and a polling queue (per-key exponential backoff
//! only). Polling workers move keys back to the primary queue, so both queues
//! feed the same reconcile path.

use crate::metrics;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::trace;

/// Decides how long a key waits before it is re-added.
pub trait RateLimiter: Send + Sync {
    /// Delay for the next add of `key`. Records a failure for per-key limiters.
    fn when(&self, key: &str) -> Duration;

    /// Clear the failure history of `key`.
    fn forget(&self, key: &str);

    /// Number of failures recorded for `key`.
    fn num_requeues(&self, key: &str) -> u32;
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-key exponential backoff: `base * 2^failures`, capped at `max`.
pub struct ItemExponentialFailureRateLimiter {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<String, u32>>,
}

impl ItemExponentialFailureRateLimiter {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimiter for ItemExponentialFailureRateLimiter {
    fn when(&self, key: &str) -> Duration {
        let mut failures = lock(&self.failures);
        let count = failures.entry(key.to_string()).or_insert(0);
        let exponent = *count;
        *count = count.saturating_add(1);

        2_u32
            .checked_pow(exponent)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }

    fn forget(&self, key: &str) {
        lock(&self.failures).remove(key);
    }

    fn num_requeues(&self, key: &str) -> u32 {
        lock(&self.failures).get(key).copied().unwrap_or(0)
    }
}

struct BucketState {
    tokens: f64,
    last: Instant,
}

/// Global token bucket: `qps` tokens per second, at most `burst` banked.
pub struct BucketRateLimiter {
    qps: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl BucketRateLimiter {
    #[must_use]
    pub fn new(qps: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            qps: qps.max(f64::MIN_POSITIVE),
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last: Instant::now(),
            }),
        }
    }
}

impl RateLimiter for BucketRateLimiter {
    fn when(&self, _key: &str) -> Duration {
        let mut state = lock(&self.state);
        let now = Instant::now();
        let elapsed = now.duration_since(state.last).as_secs_f64();
        state.last = now;
        state.tokens = (state.tokens + elapsed * self.qps).min(self.burst) - 1.0;

        if state.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-state.tokens / self.qps)
        }
    }

    fn forget(&self, _key: &str) {}

    fn num_requeues(&self, _key: &str) -> u32 {
        0
    }
}

/// Applies every limiter and waits for the slowest.
pub struct MaxOfRateLimiter {
    limiters: Vec<Box<dyn RateLimiter>>,
}

impl MaxOfRateLimiter {
    #[must_use]
    pub fn new(limiters: Vec<Box<dyn RateLimiter>>) -> Self {
        Self { limiters }
    }
}

impl RateLimiter for MaxOfRateLimiter {
    fn when(&self, key: &str) -> Duration {
        self.limiters
            .iter()
            .map(|limiter| limiter.when(key))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    fn forget(&self, key: &str) {
        for limiter in &self.limiters {
            limiter.forget(key);
        }
    }

    fn num_requeues(&self, key: &str) -> u32 {
        self.limiters
            .iter()
            .map(|limiter| limiter.num_requeues(key))
            .max()
            .unwrap_or(0)
    }
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<String>,
    /// Keys waiting to be processed (queued, or re-added while processing).
    dirty: HashSet<String>,
    /// Keys currently held by a worker.
    processing: HashSet<String>,
    shutting_down: bool,
}

/// A named work queue of string keys.
pub struct WorkQueue {
    name: &'static str,
    state: Mutex<QueueState>,
    notify: Notify,
    rate_limiter: Box<dyn RateLimiter>,
}

impl WorkQueue {
    #[must_use]
    pub fn new(name: &'static str, rate_limiter: Box<dyn RateLimiter>) -> Arc<Self> {
        Arc::new(Self {
            name,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            rate_limiter,
        })
    }

    /// Primary queue: per-key backoff combined with a global token bucket.
    #[must_use]
    pub fn primary(base: Duration, max: Duration, qps: f64, burst: u32) -> Arc<Self> {
        Self::new(
            "primary",
            Box::new(MaxOfRateLimiter::new(vec![
                Box::new(ItemExponentialFailureRateLimiter::new(base, max)),
                Box::new(BucketRateLimiter::new(qps, burst)),
            ])),
        )
    }

    /// Polling queue: per-key backoff only.
    #[must_use]
    pub fn polling(min_delay: Duration, max_delay: Duration) -> Arc<Self> {
        Self::new(
            "polling",
            Box::new(ItemExponentialFailureRateLimiter::new(min_delay, max_delay)),
        )
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Queue `key` unless it is already waiting. Ignored after shutdown.
    pub fn add(&self, key: impl Into<String>) {
        let key = key.into();
        let mut state = lock(&self.state);
        if state.shutting_down || state.dirty.contains(&key) {
            return;
        }
        state.dirty.insert(key.clone());
        metrics::record_queue_add(self.name);
        if state.processing.contains(&key) {
            trace!(queue = self.name, key = %key, "Key is being processed, deferring");
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.notify.notify_one();
    }

    /// Queue `key` after `delay`.
    pub fn add_after(self: &Arc<Self>, key: impl Into<String>, delay: Duration) {
        let key = key.into();
        if delay.is_zero() {
            self.add(key);
            return;
        }
        if self.is_shutting_down() {
            return;
        }
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Queue `key` after the rate limiter's delay.
    pub fn add_rate_limited(self: &Arc<Self>, key: impl Into<String>) {
        let key = key.into();
        let delay = self.rate_limiter.when(&key);
        trace!(queue = self.name, key = %key, delay = ?delay, "Rate-limited add");
        self.add_after(key, delay);
    }

    /// Clear the rate limiter's history for `key`.
    pub fn forget(&self, key: &str) {
        self.rate_limiter.forget(key);
    }

    #[must_use]
    pub fn num_requeues(&self, key: &str) -> u32 {
        self.rate_limiter.num_requeues(key)
    }

    /// Wait for the next key. Returns `None` once the queue is shut down and
    /// drained. The caller must call [`WorkQueue::done`] with the key.
    pub async fn get(&self) -> Option<String> {
        loop {
            {
                let mut state = lock(&self.state);
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    let more = !state.queue.is_empty();
                    drop(state);
                    if more {
                        self.notify.notify_one();
                    }
                    return Some(key);
                }
                if state.shutting_down {
                    drop(state);
                    // Pass the wakeup on to the next idle worker.
                    self.notify.notify_one();
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Release `key`; re-queue it if it was added while processing.
    pub fn done(&self, key: &str) {
        let mut state = lock(&self.state);
        state.processing.remove(key);
        if state.dirty.contains(key) {
            state.queue.push_back(key.to_string());
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Stop accepting keys and wake idle workers.
    pub fn shut_down(&self) {
        lock(&self.state).shutting_down = true;
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        lock(&self.state).shutting_down
    }

    /// Number of keys waiting to be handed out.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.state).queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod queue_tests;
