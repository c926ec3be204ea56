//! Patches and the bounded session logs backing the status snapshot.

use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::deps::TrackerStatistics;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One unit of transpiled output plus metadata for hot-reload streaming.
/// Immutable once created; a later patch for the same symbol supersedes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub id: String,
    pub symbol_id: String,
    pub js_body: String,
    pub source_text: String,
    pub version: u64,
    pub timestamp_ms: u64,
}

/// Append-only transpile timing record, bounded retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    pub patch_id: String,
    pub file_path: String,
    pub duration_ms: u64,
    pub timestamp_ms: u64,
}

/// Append-only transpile/parse error record, bounded retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub file_path: String,
    pub error: String,
    pub timestamp_ms: u64,
}

/// All session-level bookkeeping behind the status endpoint: bounded patch
/// history, latest-wins patch per symbol (replayed to new WebSocket
/// clients), metrics and error windows, and total counters that keep
/// counting past the retention caps.
#[derive(Debug)]
pub struct PatchLog {
    history: VecDeque<Patch>,
    max_history: usize,
    last_successful: HashMap<String, Patch>,
    metrics: VecDeque<MetricRecord>,
    max_metrics: usize,
    errors: VecDeque<ErrorRecord>,
    max_errors: usize,
    versions: HashMap<String, u64>,
    total_patches: u64,
    total_errors: u64,
    pub tracker_stats: TrackerStatistics,
}

impl PatchLog {
    pub fn new(max_history: usize, max_metrics: usize, max_errors: usize) -> Self {
        Self {
            history: VecDeque::new(),
            max_history,
            last_successful: HashMap::new(),
            metrics: VecDeque::new(),
            max_metrics,
            errors: VecDeque::new(),
            max_errors,
            versions: HashMap::new(),
            total_patches: 0,
            total_errors: 0,
            tracker_stats: TrackerStatistics::default(),
        }
    }

    /// Next monotonically increasing version for `symbol_id`.
    pub fn next_version(&mut self, symbol_id: &str) -> u64 {
        let version = self.versions.entry(symbol_id.to_string()).or_insert(0);
        *version += 1;
        *version
    }

    /// Record a successful patch: bounded history, latest-wins map, metric.
    pub fn record_patch(&mut self, patch: Patch, file_path: &str, duration_ms: u64) {
        self.metrics.push_back(MetricRecord {
            patch_id: patch.id.clone(),
            file_path: file_path.to_string(),
            duration_ms,
            timestamp_ms: patch.timestamp_ms,
        });
        while self.metrics.len() > self.max_metrics {
            self.metrics.pop_front();
        }

        self.last_successful
            .insert(patch.symbol_id.clone(), patch.clone());
        self.history.push_back(patch);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
        self.total_patches += 1;
    }

    pub fn record_error(&mut self, file_path: &str, error: &str) {
        self.errors.push_back(ErrorRecord {
            file_path: file_path.to_string(),
            error: error.to_string(),
            timestamp_ms: now_ms(),
        });
        while self.errors.len() > self.max_errors {
            self.errors.pop_front();
        }
        self.total_errors += 1;
    }

    /// Forget per-symbol state for a deleted script. Versions are kept so a
    /// recreated file keeps increasing its version instead of restarting.
    pub fn forget_symbol(&mut self, symbol_id: &str) {
        self.last_successful.remove(symbol_id);
    }

    /// Latest successful patch per symbol, sorted by symbol id for a
    /// deterministic replay order.
    pub fn replay_patches(&self) -> Vec<Patch> {
        let mut patches: Vec<Patch> = self.last_successful.values().cloned().collect();
        patches.sort_by(|a, b| a.symbol_id.cmp(&b.symbol_id));
        patches
    }

    pub fn last_patches(&self, n: usize) -> Vec<MetricRecord> {
        self.metrics.iter().rev().take(n).cloned().collect()
    }

    pub fn last_errors(&self, n: usize) -> Vec<ErrorRecord> {
        self.errors.iter().rev().take(n).cloned().collect()
    }

    pub fn total_patches(&self) -> u64 {
        self.total_patches
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
