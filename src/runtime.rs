//! Session-owned runtime state.
//!
//! Everything mutable in the pipeline hangs off explicit context objects
//! created per watch session, never as process-wide singletons, so tests build
//! and drop as many sessions as they like.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tokio::sync::RwLock;

use crate::patch::PatchLog;

/// Maps watched files to their script symbol ids (the file stem, per
/// GameMaker convention: `scripts/scr_attack/scr_attack.gml` → `scr_attack`).
/// Registering before transpile is what lets forward references resolve.
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    by_path: HashMap<PathBuf, String>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive and record the symbol id for `path`, returning it.
    pub fn register(&mut self, path: &Path) -> String {
        if let Some(existing) = self.by_path.get(path) {
            return existing.clone();
        }
        let symbol = symbol_id_for(path);
        self.by_path.insert(path.to_path_buf(), symbol.clone());
        symbol
    }

    pub fn unregister(&mut self, path: &Path) -> Option<String> {
        self.by_path.remove(path)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

/// Script symbol id for a file: its stem, lossily decoded.
pub fn symbol_id_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// State shared between the event loop (writer) and the servers (readers):
/// the patch/metric/error logs and the scan-complete flag. The dependency
/// tracker and snapshot store stay exclusively with the event loop and are
/// never shared.
#[derive(Debug)]
pub struct SessionStatus {
    started_at: Instant,
    scan_complete: AtomicBool,
    pub log: RwLock<PatchLog>,
}

impl SessionStatus {
    pub fn new(log: PatchLog) -> Self {
        Self {
            started_at: Instant::now(),
            scan_complete: AtomicBool::new(false),
            log: RwLock::new(log),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn mark_scan_complete(&self) {
        self.scan_complete.store(true, Ordering::Release);
    }

    pub fn is_scan_complete(&self) -> bool {
        self.scan_complete.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_id_is_the_file_stem() {
        assert_eq!(symbol_id_for(Path::new("scripts/scr_attack/scr_attack.gml")), "scr_attack");
        assert_eq!(symbol_id_for(Path::new("a.gml")), "a");
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = ScriptRegistry::new();
        let a = registry.register(Path::new("scr_a.gml"));
        let b = registry.register(Path::new("scr_a.gml"));
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_returns_symbol() {
        let mut registry = ScriptRegistry::new();
        registry.register(Path::new("scr_a.gml"));
        assert_eq!(registry.unregister(Path::new("scr_a.gml")).as_deref(), Some("scr_a"));
        assert!(registry.is_empty());
    }
}
