//! Per-path debouncing with an explicit deadline map.
//!
//! Rapid successive events for one path collapse into a single trigger once
//! the quiet period elapses. The map is owned by the watch session and
//! drained from its event loop, so shutdown can `flush()` deterministically
//! instead of racing timers captured in closures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct Debouncer {
    quiet_period: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: HashMap::new(),
        }
    }

    /// Arm (or re-arm) the deadline for `path` at `now + quiet_period`.
    pub fn record(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now + self.quiet_period);
    }

    /// Drop a pending trigger, e.g. when the path was deleted.
    pub fn cancel(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    /// The earliest pending deadline, if any. The event loop sleeps until
    /// this point before draining.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return every path whose deadline has passed, sorted for
    /// deterministic processing order.
    pub fn take_due(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut due: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|&(_, &deadline)| deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &due {
            self.pending.remove(path);
        }
        due.sort();
        due
    }

    /// Remove and return everything still pending. Called on shutdown so a
    /// final burst of edits is processed rather than silently dropped.
    pub fn flush(&mut self) -> Vec<PathBuf> {
        let mut all: Vec<PathBuf> = self.pending.drain().map(|(path, _)| path).collect();
        all.sort();
        all
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
