//! Rolling success/failure statistics.
//!
//! The window is split into fixed-length buckets kept in a ring. A bucket is
//! identified by its sequence number since the window's origin; a slot whose
//! sequence number is too old is treated as empty and recycled on write.

use std::time::{Duration, Instant};

/// Aggregated counts over the live part of the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowCounts {
    pub successes: u64,
    pub failures: u64,
}

impl WindowCounts {
    pub fn total(&self) -> u64 {
        self.successes + self.failures
    }

    /// Failure share in percent; 0 for an empty window.
    pub fn failure_percentage(&self) -> u64 {
        match self.total() {
            0 => 0,
            total => self.failures * 100 / total,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    seq: u64,
    counts: WindowCounts,
}

const EMPTY: Bucket = Bucket {
    seq: u64::MAX,
    counts: WindowCounts {
        successes: 0,
        failures: 0,
    },
};

/// Bucketed time window of call outcomes.
#[derive(Debug)]
pub struct RollingWindow {
    origin: Instant,
    bucket_len: Duration,
    buckets: Vec<Bucket>,
}

impl RollingWindow {
    /// Create a window of `length` split into `buckets` slots.
    pub fn new(origin: Instant, length: Duration, buckets: u32) -> Self {
        let buckets = buckets.max(1);
        let bucket_len = (length / buckets).max(Duration::from_millis(1));
        Self {
            origin,
            bucket_len,
            buckets: vec![EMPTY; buckets as usize],
        }
    }

    pub fn record_success(&mut self, now: Instant) {
        self.slot(now).successes += 1;
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.slot(now).failures += 1;
    }

    /// Sum of all buckets still inside the window at `now`.
    pub fn counts(&self, now: Instant) -> WindowCounts {
        let current = self.seq(now);
        let live = self.buckets.len() as u64;
        self.buckets
            .iter()
            .filter(|b| current.checked_sub(b.seq).is_some_and(|age| age < live))
            .fold(WindowCounts::default(), |acc, b| WindowCounts {
                successes: acc.successes + b.counts.successes,
                failures: acc.failures + b.counts.failures,
            })
    }

    pub fn reset(&mut self) {
        self.buckets.iter_mut().for_each(|b| *b = EMPTY);
    }

    fn seq(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.origin);
        (elapsed.as_nanos() / self.bucket_len.as_nanos()) as u64
    }

    fn slot(&mut self, now: Instant) -> &mut WindowCounts {
        let seq = self.seq(now);
        let len = self.buckets.len() as u64;
        let bucket = &mut self.buckets[(seq % len) as usize];
        if bucket.seq != seq {
            *bucket = Bucket {
                seq,
                counts: WindowCounts::default(),
            };
        }
        &mut bucket.counts
    }
}
