//! Initial bulk scan and the coalesced rescan queue.
//!
//! Discovery walks the tree with the `ignore` crate (same `.gitignore`
//! handling as any other dev tool), then file contents are read with a
//! bounded number of concurrent reads. Results are applied to the
//! coordinator strictly sequentially; concurrency here only hides I/O
//! latency at startup, it never races graph updates.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::{WatchConfig, is_excluded};
use crate::coordinator::Coordinator;
use crate::extension::ExtensionMatcher;

/// Outcome of one scan pass.
#[derive(Debug, Default)]
pub struct ScanSummary {
    pub files_found: usize,
    pub files_transpiled: usize,
    pub files_failed: usize,
    pub elapsed_secs: f64,
}

impl ScanSummary {
    /// Cargo-style one-paragraph summary on stdout; `json` for tooling.
    pub fn print(&self, symbols: usize, json: bool) {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "files_found": self.files_found,
                    "files_transpiled": self.files_transpiled,
                    "files_failed": self.files_failed,
                    "symbols": symbols,
                    "elapsed_secs": self.elapsed_secs,
                })
            );
            return;
        }
        println!(
            "Scanned {} files in {:.2}s",
            self.files_found, self.elapsed_secs
        );
        println!(
            "  {} transpiled, {} failed, {} symbols tracked",
            self.files_transpiled, self.files_failed, symbols
        );
        if self.files_failed > 0 {
            eprintln!("  {} file(s) recorded errors (see status endpoint)", self.files_failed);
        }
    }
}

/// Discover watched source files under `root`, honoring `.gitignore` and
/// the configured exclusion globs. Sorted for deterministic processing.
pub fn discover_files(
    root: &Path,
    matcher: &ExtensionMatcher,
    exclude: &[String],
) -> Vec<PathBuf> {
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(true)
        // Respect .gitignore even outside a git repository.
        .require_git(false)
        .build();

    let mut files = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(%err, "walk error");
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !matcher.matches(file_name) {
            continue;
        }
        if is_excluded(path, exclude) {
            continue;
        }
        files.push(path.to_path_buf());
    }
    files.sort();
    files
}

/// Read every file with at most `concurrency` reads in flight.
/// Results come back sorted by path.
pub async fn read_sources(
    files: Vec<PathBuf>,
    concurrency: usize,
) -> Vec<(PathBuf, std::io::Result<String>)> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut join_set = JoinSet::new();
    for path in files {
        let semaphore = Arc::clone(&semaphore);
        join_set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return (path, Err(std::io::Error::other("scan cancelled")));
                }
            };
            let contents = tokio::fs::read_to_string(&path).await;
            (path, contents)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(pair) => results.push(pair),
            Err(err) => tracing::warn!(%err, "scan read task panicked"),
        }
    }
    results.sort_by(|a, b| a.0.cmp(&b.0));
    results
}

/// One full scan pass: discover, read concurrently, apply sequentially.
pub async fn run_scan(config: &WatchConfig, coordinator: &mut Coordinator) -> ScanSummary {
    let started = Instant::now();
    let matcher = ExtensionMatcher::new(&config.extensions);
    let files = discover_files(&config.root, &matcher, &config.exclude);

    let mut summary = ScanSummary {
        files_found: files.len(),
        ..ScanSummary::default()
    };

    for (path, contents) in read_sources(files, config.scan_concurrency).await {
        match contents {
            Ok(source) => {
                if coordinator.process_scanned(&path, &source).await {
                    summary.files_transpiled += 1;
                } else {
                    summary.files_failed += 1;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between discovery and read; nothing to do.
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "scan read failed");
                summary.files_failed += 1;
            }
        }
    }

    summary.elapsed_secs = started.elapsed().as_secs_f64();
    summary
}

/// Coalesces rescan requests: at most one scan pass runs at a time, and any
/// number of triggers while one is in flight collapse into a single
/// follow-up pass.
#[derive(Debug, Default)]
pub struct ScanQueue {
    running: bool,
    queued: bool,
}

impl ScanQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a scan. Returns true when the caller should run one now;
    /// false when one is already running (a follow-up is queued instead).
    pub fn request(&mut self) -> bool {
        if self.running {
            self.queued = true;
            false
        } else {
            self.running = true;
            true
        }
    }

    /// Mark the current scan finished. Returns true when a queued request
    /// means the caller should immediately run another pass.
    pub fn finish(&mut self) -> bool {
        if self.queued {
            self.queued = false;
            true // stays running for the follow-up pass
        } else {
            self.running = false;
            false
        }
    }
}
