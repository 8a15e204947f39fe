//! In-Memory Blackboard
//!
//! The canonical `Space` implementation: a concurrent map of entries keyed by
//! a monotonic arrival sequence, with lease expiry applied lazily during
//! scans and a notifier waking blocked takers on every write.
//!
//! ## Claim semantics
//! Concurrent takers race on `DashMap::remove`: the map hands each key to at
//! most one caller, so a matching entry is claimed by exactly one taker and
//! the losers simply rescan. No lock is held across a whole `take`.

use super::types::*;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Upper bound on one wait slice inside a blocking `take`.
///
/// Arrival notifications can slip into the gap between a failed scan and the
/// next wait; the bounded slice turns a missed wakeup into extra latency
/// instead of a hang.
const POLL_SLICE: Duration = Duration::from_millis(100);

struct StoredEntry {
    entry: Entry,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |deadline| deadline <= now)
    }
}

/// In-process shared board.
pub struct MemorySpace {
    entries: DashMap<u64, StoredEntry>,
    next_seq: AtomicU64,
    arrivals: Notify,
}

impl MemorySpace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            next_seq: AtomicU64::new(0),
            arrivals: Notify::new(),
        })
    }

    /// Number of live entries currently on the board.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|item| !item.value().is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scans for the oldest live entry matching `template`, purging any
    /// expired entries encountered along the way.
    fn scan(&self, template: &Template) -> Option<u64> {
        let now = Instant::now();
        let mut expired = Vec::new();
        let mut best: Option<u64> = None;

        for item in self.entries.iter() {
            if item.value().is_expired(now) {
                expired.push(*item.key());
                continue;
            }
            if template.matches(&item.value().entry) {
                best = Some(best.map_or(*item.key(), |current| current.min(*item.key())));
            }
        }

        // Removal happens outside the iteration to keep shard locks short
        for key in expired {
            self.entries.remove(&key);
        }

        best
    }

    fn try_take(&self, template: &Template) -> Option<Entry> {
        loop {
            let seq = self.scan(template)?;
            match self.entries.remove(&seq) {
                Some((_, stored)) => {
                    if stored.is_expired(Instant::now()) {
                        continue;
                    }
                    return Some(stored.entry);
                }
                // Another taker won the race for this key; rescan
                None => continue,
            }
        }
    }
}

#[async_trait]
impl Space for MemorySpace {
    async fn write(&self, entry: Entry, lease: Lease) -> Result<()> {
        let expires_at = match lease {
            Lease::Forever => None,
            Lease::Millis(millis) => Some(Instant::now() + Duration::from_millis(millis)),
        };
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.entries.insert(seq, StoredEntry { entry, expires_at });
        self.arrivals.notify_waiters();
        Ok(())
    }

    async fn take(&self, template: Template, timeout: Timeout) -> Result<Option<Entry>> {
        let deadline = match timeout {
            Timeout::Forever => None,
            Timeout::Millis(millis) => Some(Instant::now() + Duration::from_millis(millis)),
        };

        loop {
            if let Some(entry) = self.try_take(&template) {
                return Ok(Some(entry));
            }

            let wait = match deadline {
                None => POLL_SLICE,
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(None);
                    }
                    remaining.min(POLL_SLICE)
                }
            };

            // Either a write arrives or the slice elapses; both lead to a rescan
            let _ = tokio::time::timeout(wait, self.arrivals.notified()).await;
        }
    }

    async fn take_if_exists(&self, template: Template) -> Result<Option<Entry>> {
        Ok(self.try_take(&template))
    }
}
