//! Process-local counter registry used when Redis is unreachable.
//!
//! This is a degraded-mode fallback, not a cache: counts here are scoped to
//! one serving process and are never reconciled with the durable store once
//! it recovers. The registry is owned explicitly by the limiter (no
//! module-level singleton) and mutates under a single mutex.

use std::collections::HashMap;
use std::sync::Mutex;

/// Stale entries are swept once the map grows past this many keys.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug)]
struct Counter {
    count: u64,
    window_end_ms: u64,
}

#[derive(Debug, Default)]
pub struct MemoryCounters {
    inner: Mutex<HashMap<String, Counter>>,
}

impl MemoryCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter for `key`, returning the post-increment count.
    /// A key whose window has passed restarts at 1 for the new window.
    pub fn incr(&self, key: &str, window_end_ms: u64, now_ms: u64) -> u64 {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if map.len() >= PRUNE_THRESHOLD {
            map.retain(|_, c| c.window_end_ms > now_ms);
        }

        let counter = map.entry(key.to_string()).or_insert(Counter {
            count: 0,
            window_end_ms,
        });
        if now_ms >= counter.window_end_ms {
            counter.count = 0;
            counter.window_end_ms = window_end_ms;
        }
        counter.count += 1;
        counter.count
    }

    /// Reads the current count without incrementing. Expired windows read
    /// as zero.
    pub fn get(&self, key: &str, now_ms: u64) -> u64 {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match map.get(key) {
            Some(c) if c.window_end_ms > now_ms => c.count,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incr_counts_up_within_window() {
        let counters = MemoryCounters::new();
        assert_eq!(counters.incr("k", 60_000, 1_000), 1);
        assert_eq!(counters.incr("k", 60_000, 2_000), 2);
        assert_eq!(counters.incr("k", 60_000, 3_000), 3);
    }

    #[test]
    fn test_expired_window_restarts_at_one() {
        let counters = MemoryCounters::new();
        counters.incr("k", 60_000, 1_000);
        counters.incr("k", 60_000, 2_000);
        // now past the window end: fresh window
        assert_eq!(counters.incr("k", 120_000, 60_000), 1);
    }

    #[test]
    fn test_get_does_not_increment() {
        let counters = MemoryCounters::new();
        counters.incr("k", 60_000, 1_000);
        assert_eq!(counters.get("k", 2_000), 1);
        assert_eq!(counters.get("k", 2_000), 1);
    }

    #[test]
    fn test_get_reads_expired_window_as_zero() {
        let counters = MemoryCounters::new();
        counters.incr("k", 60_000, 1_000);
        assert_eq!(counters.get("k", 60_000), 0);
    }

    #[test]
    fn test_keys_are_independent() {
        let counters = MemoryCounters::new();
        counters.incr("a", 60_000, 1_000);
        counters.incr("a", 60_000, 1_000);
        assert_eq!(counters.incr("b", 60_000, 1_000), 1);
    }
}
