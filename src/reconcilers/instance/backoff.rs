// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backoff between provision and update attempts of one instance generation.
//!
//! Every status write comes back through the watch as an immediate re-add,
//! so without this map a failing broker would see a new provision right after
//! orphan mitigation finishes. Entries are keyed by instance UID and tied to a
//! generation: a new generation starts without delay.
//!
//! # Lifecycle
//!
//! 1. [`OperationBackoff::mark_attempt`] before each provision or update call
//! 2. [`OperationBackoff::pending_delay`] at the start of the next add or
//!    update; the first check after an attempt computes the next retry time
//! 3. [`OperationBackoff::remove`] on success or terminal failure
//! 4. [`OperationBackoff::purge_expired`] drops entries nobody came back for

use crate::queue::{lock, ItemExponentialFailureRateLimiter, RateLimiter};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::trace;

struct BackoffEntry {
    generation: i64,
    marked_at: Instant,
    /// Earliest time of the next attempt, once computed.
    retry_at: Option<Instant>,
    /// An attempt was sent since `retry_at` was last computed.
    dirty: bool,
}

/// Per-instance, per-generation retry delays.
pub struct OperationBackoff {
    entries: Mutex<HashMap<String, BackoffEntry>>,
    limiter: ItemExponentialFailureRateLimiter,
    max_delay: Duration,
}

impl OperationBackoff {
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            limiter: ItemExponentialFailureRateLimiter::new(min_delay, max_delay),
            max_delay,
        }
    }

    /// Record that an attempt for `generation` is about to be sent.
    ///
    /// A different generation than the recorded one resets the backoff.
    pub fn mark_attempt(&self, uid: &str, generation: i64) {
        let now = Instant::now();
        let mut entries = lock(&self.entries);
        if entries.get(uid).is_some_and(|e| e.generation != generation) {
            entries.remove(uid);
            self.limiter.forget(uid);
        }
        let entry = entries.entry(uid.to_string()).or_insert(BackoffEntry {
            generation,
            marked_at: now,
            retry_at: None,
            dirty: true,
        });
        entry.marked_at = now;
        entry.dirty = true;
        trace!(uid, generation, "Marked broker operation attempt");
    }

    /// Time left before `generation` may be attempted again.
    ///
    /// Returns `None` when there is no entry, the entry belongs to another
    /// generation (it is dropped) or the retry time has passed.
    pub fn pending_delay(&self, uid: &str, generation: i64) -> Option<Duration> {
        let now = Instant::now();
        let mut entries = lock(&self.entries);
        let entry = entries.get_mut(uid)?;
        if entry.generation != generation {
            entries.remove(uid);
            self.limiter.forget(uid);
            return None;
        }
        if entry.dirty {
            entry.retry_at = now.checked_add(self.limiter.when(uid));
            entry.dirty = false;
        }
        let remaining = entry.retry_at?.saturating_duration_since(now);
        (!remaining.is_zero()).then_some(remaining)
    }

    /// Forget `uid` and its backoff history.
    pub fn remove(&self, uid: &str) {
        if lock(&self.entries).remove(uid).is_some() {
            trace!(uid, "Cleared broker operation backoff");
        }
        self.limiter.forget(uid);
    }

    /// Drop entries whose last activity lies more than the maximum delay in
    /// the past. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|uid, entry| {
            let last = entry.retry_at.unwrap_or(entry.marked_at).max(entry.marked_at);
            let keep = now.saturating_duration_since(last) <= self.max_delay;
            if !keep {
                self.limiter.forget(uid);
            }
            keep
        });
        before - entries.len()
    }

    /// Number of failed attempts recorded for `uid`.
    #[must_use]
    pub fn attempts(&self, uid: &str) -> u32 {
        self.limiter.num_requeues(uid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod backoff_tests;
